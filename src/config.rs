//! Pipeline configuration loaded from an optional YAML file.
//!
//! Every field has a default, so running without `--config` uses the values
//! the production deployment was built around. A file only needs to name the
//! fields it overrides:
//!
//! ```yaml
//! catalog:
//!   crawler_name: crawlers3pt3
//!   timeout_secs: 900
//! cluster:
//!   instance_count: 5
//! ```

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub cluster: ClusterConfig,
}

/// Where raw pages live and where partitioned CSVs go.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Folder that raw HTML uploads land in.
    pub raw_prefix: String,
    /// Extension of raw uploads.
    pub raw_suffix: String,
    /// Root of the partitioned output tree.
    pub final_prefix: String,
    /// File name written inside each partition.
    pub output_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_prefix: "headlines/raw/".to_string(),
            raw_suffix: ".html".to_string(),
            final_prefix: "headlines/final".to_string(),
            output_file: "headlines.csv".to_string(),
        }
    }
}

/// Crawler and catalog table checked by `refresh-catalog`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub crawler_name: String,
    pub database: String,
    pub table: String,
    pub poll_interval_secs: u64,
    /// Upper bound on the whole wait; `None` waits until the crawler is ready.
    pub timeout_secs: Option<u64>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            crawler_name: "crawlers3pt3".to_string(),
            database: "dbs3pnt3".to_string(),
            table: "s3pnt3headlines".to_string(),
            poll_interval_secs: 10,
            timeout_secs: None,
        }
    }
}

impl CatalogConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Transient cluster provisioned by `run-cluster-job`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub name: String,
    pub log_uri: String,
    pub release_label: String,
    pub applications: Vec<String>,
    pub instance_type: String,
    pub instance_count: i32,
    pub ec2_key_name: String,
    pub subnet_id: String,
    pub master_security_group: String,
    pub slave_security_group: String,
    pub bootstrap_name: String,
    pub bootstrap_script: String,
    pub service_role: String,
    pub job_flow_role: String,
    pub step_name: String,
    /// PySpark script submitted by the single step.
    pub script_path: String,
    pub spark_submit_args: Vec<String>,
    pub poll_interval_secs: u64,
    pub timeout_secs: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: "NewEMRCluster".to_string(),
            log_uri: "s3://headlinesdyn/logdeemr/".to_string(),
            release_label: "emr-6.9.0".to_string(),
            applications: ["Spark", "Hadoop", "JupyterHub", "JupyterEnterpriseGateway"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            instance_type: "m5.xlarge".to_string(),
            instance_count: 3,
            ec2_key_name: "vockey".to_string(),
            subnet_id: "subnet-008ac3b1dd24a8210".to_string(),
            master_security_group: "sg-029abf80d1e92a4c5".to_string(),
            slave_security_group: "sg-0b25b79d8a1e54919".to_string(),
            bootstrap_name: "Install Spark and Dependencies".to_string(),
            bootstrap_script: "s3://headlinesdyn/bootstrap/bootstrap.sh".to_string(),
            service_role: "EMR_DefaultRole".to_string(),
            job_flow_role: "EMR_EC2_DefaultRole".to_string(),
            step_name: "Run PySpark Job".to_string(),
            script_path: "s3://headlinesdyn/jobs/headlines_job.py".to_string(),
            spark_submit_args: [
                "--master",
                "yarn",
                "--deploy-mode",
                "cluster",
                "--num-executors",
                "3",
                "--executor-memory",
                "4G",
                "--executor-cores",
                "2",
                "--driver-memory",
                "4G",
                "--conf",
                "spark.hadoop.fs.s3a.aws.credentials.provider=com.amazonaws.auth.DefaultAWSCredentialsProviderChain",
                "--conf",
                "spark.sql.shuffle.partitions=50",
                "--conf",
                "spark.sql.parquet.writeLegacyFormat=true",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            poll_interval_secs: 60,
            timeout_secs: None,
        }
    }
}

impl ClusterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Full argument vector for `command-runner.jar`.
    pub fn step_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.spark_submit_args.len() + 2);
        args.push("spark-submit".to_string());
        args.extend(self.spark_submit_args.iter().cloned());
        args.push(self.script_path.clone());
        args
    }
}

impl PipelineConfig {
    /// Parse a YAML document, rejecting zero poll intervals.
    pub fn from_yaml(text: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or fall back to defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let Some(path) = path else {
            info!("No config file given; using built-in defaults");
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).await.map_err(|e| {
            PipelineError::Config(format!("reading {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.catalog.poll_interval_secs == 0 {
            return Err(PipelineError::Config(
                "catalog.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.cluster.poll_interval_secs == 0 {
            return Err(PipelineError::Config(
                "cluster.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.storage.raw_prefix.is_empty() || self.storage.output_file.is_empty() {
            return Err(PipelineError::Config(
                "storage.raw_prefix and storage.output_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
