mod resources;

pub use resources::{
  ContainerMetrics, DeploymentConfig, DeploymentConfigSpec, PodMetrics, StreamImage, get_cron_jobs, get_daemon_sets,
  get_deployment_configs, get_deployments, get_image_stream_image, get_namespaces, get_pod_metrics, get_pods,
  get_stateful_sets,
};
