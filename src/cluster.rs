//! Transient cluster job: provision, run one step, wait for teardown.
//!
//! The cluster is created with `keep_job_flow_alive_when_no_steps = false`
//! and a single step whose failure action terminates the cluster, so it
//! always tears itself down. This module only has to wait for one of the two
//! terminal states.

use crate::config::ClusterConfig;
use crate::error::PipelineError;
use crate::wait::{Poller, Probe};
use aws_sdk_emr::Client;
use aws_sdk_emr::error::DisplayErrorContext;
use aws_sdk_emr::types::{
    ActionOnFailure, Application, BootstrapActionConfig, HadoopJarStepConfig,
    JobFlowInstancesConfig, ScriptBootstrapActionConfig, StepConfig,
};
use std::fmt;
use tracing::{error, info, instrument};

/// Jar that runs `spark-submit` on the master node.
pub const COMMAND_RUNNER_JAR: &str = "command-runner.jar";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterState {
    Starting,
    Bootstrapping,
    Running,
    Waiting,
    Terminating,
    Terminated,
    TerminatedWithErrors,
    Other(String),
}

impl ClusterState {
    pub fn from_name(name: &str) -> Self {
        match name {
            "STARTING" => ClusterState::Starting,
            "BOOTSTRAPPING" => ClusterState::Bootstrapping,
            "RUNNING" => ClusterState::Running,
            "WAITING" => ClusterState::Waiting,
            "TERMINATING" => ClusterState::Terminating,
            "TERMINATED" => ClusterState::Terminated,
            "TERMINATED_WITH_ERRORS" => ClusterState::TerminatedWithErrors,
            other => ClusterState::Other(other.to_string()),
        }
    }

    /// Both terminated variants end the wait.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClusterState::Terminated | ClusterState::TerminatedWithErrors)
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterState::Starting => "STARTING",
            ClusterState::Bootstrapping => "BOOTSTRAPPING",
            ClusterState::Running => "RUNNING",
            ClusterState::Waiting => "WAITING",
            ClusterState::Terminating => "TERMINATING",
            ClusterState::Terminated => "TERMINATED",
            ClusterState::TerminatedWithErrors => "TERMINATED_WITH_ERRORS",
            ClusterState::Other(s) => s,
        };
        f.write_str(name)
    }
}

/// Cluster provisioning calls.
pub trait ClusterClient {
    /// Request a new cluster; returns its id.
    async fn create_cluster(&self, config: &ClusterConfig) -> Result<String, PipelineError>;

    async fn cluster_state(&self, cluster_id: &str) -> Result<ClusterState, PipelineError>;
}

/// How the cluster ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRun {
    pub cluster_id: String,
    pub final_state: ClusterState,
    pub polls: u32,
}

impl ClusterRun {
    pub fn succeeded(&self) -> bool {
        self.final_state == ClusterState::Terminated
    }
}

/// Create the cluster and block until it reaches a terminal state.
#[instrument(level = "info", skip_all, fields(cluster = %config.name))]
pub async fn run_cluster_job<C: ClusterClient>(
    client: &C,
    config: &ClusterConfig,
    poller: &Poller,
) -> Result<ClusterRun, PipelineError> {
    let cluster_id = client.create_cluster(config).await.map_err(|e| {
        error!(error = %e, "Failed to create cluster");
        e
    })?;
    info!(%cluster_id, "Cluster created");

    let id = cluster_id.as_str();
    let mut polls = 0u32;
    let final_state = poller
        .until("cluster", |attempt| {
            polls = attempt;
            async move {
                match client.cluster_state(id).await {
                    Err(e) => Err(e),
                    Ok(state) if state.is_terminal() => Ok(Probe::Done(state)),
                    Ok(state) => {
                        info!(attempt, cluster_id = id, %state, "Cluster still active");
                        Ok(Probe::Pending)
                    }
                }
            }
        })
        .await?;

    if final_state == ClusterState::Terminated {
        info!(%cluster_id, polls, "Cluster terminated");
    } else {
        error!(%cluster_id, polls, state = %final_state, "Cluster terminated with errors");
    }

    Ok(ClusterRun {
        cluster_id,
        final_state,
        polls,
    })
}

/// EMR-backed [`ClusterClient`].
#[derive(Debug, Clone)]
pub struct EmrClusters {
    client: Client,
}

impl EmrClusters {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

/// Everything `run_job_flow` is called with apart from names and roles.
#[derive(Debug, Clone)]
pub struct ClusterRequest {
    pub instances: JobFlowInstancesConfig,
    pub bootstrap: BootstrapActionConfig,
    pub step: StepConfig,
    pub applications: Vec<Application>,
    pub visible_to_all_users: bool,
}

/// Build the fixed cluster shape: no keep-alive, no termination protection,
/// and one `spark-submit` step that terminates the cluster on failure.
pub fn cluster_request(config: &ClusterConfig) -> ClusterRequest {
    let instances = JobFlowInstancesConfig::builder()
        .master_instance_type(&config.instance_type)
        .slave_instance_type(&config.instance_type)
        .instance_count(config.instance_count)
        .keep_job_flow_alive_when_no_steps(false)
        .termination_protected(false)
        .ec2_key_name(&config.ec2_key_name)
        .ec2_subnet_id(&config.subnet_id)
        .emr_managed_master_security_group(&config.master_security_group)
        .emr_managed_slave_security_group(&config.slave_security_group)
        .build();

    let bootstrap = BootstrapActionConfig::builder()
        .name(&config.bootstrap_name)
        .script_bootstrap_action(
            ScriptBootstrapActionConfig::builder()
                .path(&config.bootstrap_script)
                .build(),
        )
        .build();

    let step = StepConfig::builder()
        .name(&config.step_name)
        .action_on_failure(ActionOnFailure::TerminateCluster)
        .hadoop_jar_step(
            HadoopJarStepConfig::builder()
                .jar(COMMAND_RUNNER_JAR)
                .set_args(Some(config.step_args()))
                .build(),
        )
        .build();

    let applications = config
        .applications
        .iter()
        .map(|name| Application::builder().name(name).build())
        .collect();

    ClusterRequest {
        instances,
        bootstrap,
        step,
        applications,
        visible_to_all_users: true,
    }
}

impl ClusterClient for EmrClusters {
    #[instrument(level = "info", skip_all, fields(release = %config.release_label, instances = config.instance_count))]
    async fn create_cluster(&self, config: &ClusterConfig) -> Result<String, PipelineError> {
        let request = cluster_request(config);

        let response = self
            .client
            .run_job_flow()
            .name(&config.name)
            .log_uri(&config.log_uri)
            .release_label(&config.release_label)
            .set_applications(Some(request.applications))
            .instances(request.instances)
            .bootstrap_actions(request.bootstrap)
            .service_role(&config.service_role)
            .job_flow_role(&config.job_flow_role)
            .steps(request.step)
            .visible_to_all_users(request.visible_to_all_users)
            .send()
            .await
            .map_err(|e| PipelineError::Cluster(DisplayErrorContext(&e).to_string()))?;

        response
            .job_flow_id()
            .map(str::to_string)
            .ok_or_else(|| PipelineError::Cluster("create response carried no cluster id".to_string()))
    }

    #[instrument(level = "debug", skip(self))]
    async fn cluster_state(&self, cluster_id: &str) -> Result<ClusterState, PipelineError> {
        let response = self
            .client
            .describe_cluster()
            .cluster_id(cluster_id)
            .send()
            .await
            .map_err(|e| PipelineError::Cluster(DisplayErrorContext(&e).to_string()))?;

        response
            .cluster()
            .and_then(|c| c.status())
            .and_then(|s| s.state())
            .map(|state| ClusterState::from_name(state.as_str()))
            .ok_or_else(|| PipelineError::Cluster(format!("cluster {cluster_id} reported no state")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::time::Duration;

    struct FakeClusters {
        states: RefCell<VecDeque<ClusterState>>,
        create_calls: Cell<u32>,
        describe_calls: Cell<u32>,
    }

    impl FakeClusters {
        fn new(states: Vec<ClusterState>) -> Self {
            Self {
                states: RefCell::new(states.into()),
                create_calls: Cell::new(0),
                describe_calls: Cell::new(0),
            }
        }
    }

    impl ClusterClient for FakeClusters {
        async fn create_cluster(&self, _config: &ClusterConfig) -> Result<String, PipelineError> {
            self.create_calls.set(self.create_calls.get() + 1);
            Ok("j-TESTCLUSTER".to_string())
        }

        async fn cluster_state(&self, cluster_id: &str) -> Result<ClusterState, PipelineError> {
            assert_eq!(cluster_id, "j-TESTCLUSTER");
            self.describe_calls.set(self.describe_calls.get() + 1);
            self.states
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| PipelineError::Cluster("no more states".to_string()))
        }
    }

    fn poller() -> Poller {
        Poller::new(Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminated_ends_wait_with_success() {
        let fake = FakeClusters::new(vec![
            ClusterState::Starting,
            ClusterState::Bootstrapping,
            ClusterState::Running,
            ClusterState::Terminating,
            ClusterState::Terminated,
        ]);
        let run = run_cluster_job(&fake, &ClusterConfig::default(), &poller())
            .await
            .unwrap();
        assert_eq!(run.cluster_id, "j-TESTCLUSTER");
        assert_eq!(run.final_state, ClusterState::Terminated);
        assert!(run.succeeded());
        assert_eq!(run.polls, 5);
        assert_eq!(fake.create_calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminated_with_errors_also_ends_wait() {
        let fake = FakeClusters::new(vec![
            ClusterState::Running,
            ClusterState::TerminatedWithErrors,
            ClusterState::Running,
        ]);
        let run = run_cluster_job(&fake, &ClusterConfig::default(), &poller())
            .await
            .unwrap();
        assert_eq!(run.final_state, ClusterState::TerminatedWithErrors);
        assert!(!run.succeeded());
        assert_eq!(fake.describe_calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_describe_failure_propagates() {
        let fake = FakeClusters::new(vec![ClusterState::Running]);
        let err = run_cluster_job(&fake, &ClusterConfig::default(), &poller())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cluster(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bounds_wait() {
        let fake = FakeClusters::new(vec![ClusterState::Waiting; 50]);
        let bounded = poller().with_timeout(Some(Duration::from_secs(300)));
        let err = run_cluster_job(&fake, &ClusterConfig::default(), &bounded)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TimedOut { .. }));
    }

    #[test]
    fn test_cluster_request_tears_itself_down() {
        let config = ClusterConfig::default();
        let request = cluster_request(&config);

        assert_eq!(request.instances.keep_job_flow_alive_when_no_steps(), Some(false));
        assert_eq!(request.instances.termination_protected(), Some(false));
        assert_eq!(request.instances.instance_count(), Some(3));
        assert_eq!(request.instances.master_instance_type(), Some("m5.xlarge"));
        assert_eq!(request.instances.slave_instance_type(), Some("m5.xlarge"));
        assert!(request.visible_to_all_users);

        assert_eq!(request.step.name(), Some("Run PySpark Job"));
        assert_eq!(request.step.action_on_failure(), Some(&ActionOnFailure::TerminateCluster));
        let jar_step = request.step.hadoop_jar_step().unwrap();
        assert_eq!(jar_step.jar(), Some(COMMAND_RUNNER_JAR));
        assert_eq!(jar_step.args().first().map(String::as_str), Some("spark-submit"));
        assert_eq!(
            jar_step.args().last().map(String::as_str),
            Some("s3://headlinesdyn/jobs/headlines_job.py")
        );
    }

    #[test]
    fn test_cluster_request_bootstrap_and_applications() {
        let request = cluster_request(&ClusterConfig::default());

        assert_eq!(request.bootstrap.name(), Some("Install Spark and Dependencies"));
        assert_eq!(
            request
                .bootstrap
                .script_bootstrap_action()
                .and_then(|script| script.path()),
            Some("s3://headlinesdyn/bootstrap/bootstrap.sh")
        );

        let names: Vec<_> = request.applications.iter().filter_map(|a| a.name()).collect();
        assert_eq!(names, vec!["Spark", "Hadoop", "JupyterHub", "JupyterEnterpriseGateway"]);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ClusterState::from_name("TERMINATED").is_terminal());
        assert!(ClusterState::from_name("TERMINATED_WITH_ERRORS").is_terminal());
        assert!(!ClusterState::from_name("TERMINATING").is_terminal());
        assert!(!ClusterState::from_name("WAITING").is_terminal());
        assert_eq!(
            ClusterState::from_name("NEW_STATE"),
            ClusterState::Other("NEW_STATE".to_string())
        );
        assert_eq!(ClusterState::TerminatedWithErrors.to_string(), "TERMINATED_WITH_ERRORS");
    }
}
