//! Built-in detection rules.
//!
//! Thresholds are in scaled units: percentage metrics carry `scale: 0.01` so
//! their thresholds read as ratios. Bands list the boundaries from least to
//! most severe; rules without bands always report at their weight.

use crate::config::AnalysisDepth;
use crate::insights::{Category, PipelineType, Severity};

use super::rules::{Comparison, PatternKind, PatternRule, Threshold, ThresholdKey, ThresholdRule, Unit};

pub fn builtin_threshold_rules() -> Vec<ThresholdRule> {
    let mut rules = devops_rules();
    rules.extend(mlops_rules());
    rules
}

fn devops_rules() -> Vec<ThresholdRule> {
    let devops = ThresholdRule {
        pipeline: PipelineType::Devops,
        ..ThresholdRule::default()
    };

    vec![
        ThresholdRule {
            id: "build_failure_rate",
            metric: "build_failure_rate",
            threshold: Threshold::Number(0.15),
            category: Category::Reliability,
            weight: Severity::High,
            confidence: 0.95,
            component: "Build Process",
            title: "High Build Failure Rate",
            description: "Build failure rate is {value}, indicating instability",
            impact: "Failed builds block deployments and waste resources",
            hint: "Investigate common failure patterns, improve test stability, add pre-commit hooks, review recent code changes",
            bands: Some([0.15, 0.30, 0.50]),
            unit: Unit::Ratio,
            ..devops.clone()
        },
        ThresholdRule {
            id: "slow_builds",
            metric: "build_duration_avg",
            threshold: Threshold::Number(600.0),
            category: Category::Performance,
            weight: Severity::Medium,
            confidence: 0.90,
            component: "CI/CD Pipeline",
            title: "Slow Build Times",
            description: "Average build time is {value}, exceeding the {threshold} target",
            impact: "Delayed feedback cycles and reduced developer productivity",
            hint: "Enable build caching, parallelize test execution, use faster build agents, optimize dependency resolution",
            bands: Some([600.0, 900.0, 1200.0]),
            unit: Unit::Seconds,
            ..devops.clone()
        },
        ThresholdRule {
            id: "deployment_failure_rate",
            metric: "deployment_failure_rate",
            threshold: Threshold::Number(0.10),
            category: Category::Reliability,
            weight: Severity::Critical,
            confidence: 0.92,
            component: "Deployment Pipeline",
            title: "High Deployment Failure Rate",
            description: "Deployment failure rate is {value}",
            impact: "Failed deployments cause service disruptions, rollbacks and delayed feature releases",
            hint: "Review the deployment process, add pre-deployment testing and automated rollback",
            bands: Some([0.10, 0.25, 0.40]),
            unit: Unit::Ratio,
            config_key: Some(ThresholdKey::FailureRate),
            ..devops.clone()
        },
        ThresholdRule {
            id: "build_cpu_pressure",
            metric: "build_cpu_peak",
            threshold: Threshold::Number(0.8),
            scale: 0.01,
            category: Category::Performance,
            weight: Severity::High,
            confidence: 0.88,
            component: "Build Infrastructure",
            title: "High CPU Usage",
            description: "CPU usage reached {value}",
            impact: "High CPU usage causes build slowdowns, potential timeouts and resource contention",
            hint: "Scale build agents, distribute workload, investigate CPU-intensive operations",
            bands: Some([0.80, 0.90, 0.97]),
            unit: Unit::Percent,
            context: &["build_cpu_avg"],
            config_key: Some(ThresholdKey::ResourceUsage),
            ..devops.clone()
        },
        ThresholdRule {
            id: "build_memory_pressure",
            metric: "build_memory_peak",
            threshold: Threshold::Number(0.8),
            scale: 0.01,
            category: Category::Performance,
            weight: Severity::High,
            confidence: 0.87,
            component: "Build Infrastructure",
            title: "High Memory Usage",
            description: "Memory usage reached {value}",
            impact: "High memory usage can cause OOM errors, build failures and system instability",
            hint: "Increase memory allocation, investigate memory leaks, add memory monitoring",
            bands: Some([0.85, 0.92, 0.97]),
            unit: Unit::Percent,
            context: &["build_memory_avg"],
            config_key: Some(ThresholdKey::ResourceUsage),
            ..devops.clone()
        },
        ThresholdRule {
            id: "critical_vulnerabilities",
            metric: "critical_vulnerabilities",
            threshold: Threshold::Number(0.0),
            category: Category::Security,
            weight: Severity::Critical,
            confidence: 0.98,
            component: "Dependencies/Code",
            title: "Critical Security Vulnerabilities Detected",
            description: "Found {value} critical security vulnerabilities",
            impact: "Critical vulnerabilities pose immediate security risks",
            hint: "Update vulnerable dependencies immediately",
            ..devops.clone()
        },
        ThresholdRule {
            id: "high_vulnerabilities",
            metric: "high_vulnerabilities",
            threshold: Threshold::Number(5.0),
            category: Category::Security,
            weight: Severity::High,
            confidence: 0.95,
            component: "Dependencies/Code",
            title: "Multiple High-Severity Vulnerabilities",
            description: "Found {value} high-severity security vulnerabilities",
            impact: "High-severity vulnerabilities require prompt attention to prevent breaches",
            hint: "Review and update vulnerable dependencies, run security scanning in CI/CD",
            bands: Some([5.0, 10.0, 20.0]),
            ..devops.clone()
        },
        ThresholdRule {
            id: "security_scan_failed",
            metric: "security_scan_status",
            comparison: Comparison::Equal,
            threshold: Threshold::Category("failed"),
            category: Category::Security,
            weight: Severity::High,
            confidence: 0.90,
            component: "Security Scanning",
            title: "Security Scan Failed",
            description: "The latest security scan reported status '{value}'",
            impact: "Unscanned changes may ship known vulnerabilities",
            hint: "Inspect the scanner output and fix the scan configuration before the next release",
            ..devops.clone()
        },
        ThresholdRule {
            id: "failed_pods",
            metric: "failed_pods",
            threshold: Threshold::Number(0.0),
            category: Category::Reliability,
            weight: Severity::Critical,
            confidence: 0.95,
            component: "Kubernetes Cluster",
            title: "Kubernetes Pod Failures",
            description: "{value} pods are in failed state",
            impact: "Services may be degraded or unavailable",
            hint: "Inspect pod logs for image pull errors, OOM kills, probe failures or bad environment variables",
            ..devops.clone()
        },
        ThresholdRule {
            id: "pending_pods",
            metric: "pending_pods",
            threshold: Threshold::Number(3.0),
            category: Category::Reliability,
            weight: Severity::High,
            confidence: 0.90,
            component: "Kubernetes Scheduler",
            title: "Multiple Pods Stuck in Pending State",
            description: "{value} pods cannot be scheduled",
            impact: "Pending pods prevent services from scaling or deploying",
            hint: "Check node resources, resource requests, node selectors, taints and autoscaling configuration",
            bands: Some([3.0, 6.0, 10.0]),
            ..devops.clone()
        },
        ThresholdRule {
            id: "unhealthy_nodes",
            metric: "unhealthy_nodes",
            threshold: Threshold::Number(0.0),
            category: Category::Reliability,
            weight: Severity::Critical,
            confidence: 0.96,
            component: "Kubernetes Nodes",
            title: "Unhealthy Kubernetes Nodes",
            description: "{value} nodes are not in Ready state",
            impact: "Unhealthy nodes reduce cluster capacity and may cause pod evictions",
            hint: "Check node conditions for disk pressure, memory pressure, network or kubelet problems",
            ..devops.clone()
        },
        ThresholdRule {
            id: "unavailable_deployments",
            metric: "unavailable_deployments",
            threshold: Threshold::Number(0.0),
            category: Category::Reliability,
            weight: Severity::Critical,
            confidence: 0.98,
            component: "Kubernetes Deployments",
            title: "Kubernetes Deployments with Zero Availability",
            description: "{value} deployments have no available replicas",
            impact: "Services are completely unavailable",
            hint: "Review pod events, resource limits and image availability for the affected deployments",
            ..devops.clone()
        },
        ThresholdRule {
            id: "underscaled_deployments",
            metric: "underscaled_deployments",
            threshold: Threshold::Number(0.0),
            category: Category::Reliability,
            weight: Severity::High,
            confidence: 0.88,
            component: "Kubernetes Deployments",
            title: "Under-Scaled Kubernetes Deployments",
            description: "{value} deployments run below their desired replica count",
            impact: "Reduced capacity and redundancy",
            hint: "Check resource availability, HPA configuration and scheduling constraints",
            bands: Some([1.0, 3.0, 5.0]),
            ..devops.clone()
        },
        ThresholdRule {
            id: "cluster_cpu_pressure",
            metric: "cluster_cpu_usage_percent",
            threshold: Threshold::Number(0.85),
            scale: 0.01,
            category: Category::Performance,
            weight: Severity::High,
            confidence: 0.92,
            component: "Kubernetes Cluster Resources",
            title: "High Kubernetes Cluster CPU Usage",
            description: "Cluster CPU usage at {value}",
            impact: "CPU pressure causes throttling, slow responses and scheduling failures",
            hint: "Scale cluster nodes, tune pod requests and limits, consider horizontal pod autoscaling",
            bands: Some([0.85, 0.92, 0.97]),
            unit: Unit::Percent,
            ..devops.clone()
        },
        ThresholdRule {
            id: "cluster_memory_pressure",
            metric: "cluster_memory_usage_percent",
            threshold: Threshold::Number(0.85),
            scale: 0.01,
            category: Category::Performance,
            weight: Severity::High,
            confidence: 0.92,
            component: "Kubernetes Cluster Resources",
            title: "High Kubernetes Cluster Memory Usage",
            description: "Cluster memory usage at {value}",
            impact: "Memory pressure triggers OOM kills and evictions",
            hint: "Scale cluster nodes, review memory requests and limits, enable cluster autoscaling",
            bands: Some([0.85, 0.92, 0.97]),
            unit: Unit::Percent,
            ..devops.clone()
        },
        ThresholdRule {
            id: "pending_pvcs",
            metric: "pending_pvcs",
            threshold: Threshold::Number(0.0),
            category: Category::Reliability,
            weight: Severity::High,
            confidence: 0.87,
            component: "Kubernetes Storage",
            title: "Pending Persistent Volume Claims",
            description: "{value} PVCs are unable to bind to volumes",
            impact: "Applications requiring persistent storage cannot start",
            hint: "Check storage class availability, the volume provisioner and cluster storage capacity",
            bands: Some([1.0, 3.0, 5.0]),
            ..devops.clone()
        },
        ThresholdRule {
            id: "service_mesh_errors",
            metric: "service_mesh_error_rate",
            threshold: Threshold::Number(0.05),
            category: Category::Reliability,
            weight: Severity::High,
            confidence: 0.85,
            component: "Service Mesh",
            title: "High Service Mesh Error Rate",
            description: "Service mesh reporting {value} error rate",
            impact: "Service-to-service communication failures impact application reliability",
            hint: "Check for misconfigured routes, verify mTLS settings, investigate failing services",
            bands: Some([0.05, 0.10, 0.20]),
            unit: Unit::Ratio,
            ..devops
        },
    ]
}

fn mlops_rules() -> Vec<ThresholdRule> {
    let mlops = ThresholdRule {
        pipeline: PipelineType::Mlops,
        ..ThresholdRule::default()
    };

    vec![
        ThresholdRule {
            id: "low_f1_score",
            metric: "model_f1_score",
            comparison: Comparison::LessThan,
            threshold: Threshold::Number(0.7),
            category: Category::Quality,
            weight: Severity::Medium,
            confidence: 0.85,
            component: "ML Model",
            title: "Low Model F1 Score",
            description: "Current F1 score is {value}, below threshold of {threshold}",
            impact: "Poor balance between precision and recall",
            hint: "Review class imbalance, adjust the decision threshold, collect more data for underrepresented classes",
            bands: Some([0.7, 0.6, 0.5]),
            unit: Unit::Score,
            ..mlops.clone()
        },
        ThresholdRule {
            id: "long_training",
            metric: "training_duration_avg",
            threshold: Threshold::Number(14_400.0),
            category: Category::Performance,
            weight: Severity::Medium,
            confidence: 0.82,
            component: "Training Pipeline",
            title: "Long Training Times",
            description: "Average training time is {value}",
            impact: "Long training times slow down model iteration and increase costs",
            hint: "Use mixed precision, gradient accumulation or distributed training, profile the training loop",
            bands: Some([14_400.0, 21_600.0, 28_800.0]),
            unit: Unit::Seconds,
            ..mlops.clone()
        },
        ThresholdRule {
            id: "low_gpu_utilization",
            metric: "gpu_utilization_avg",
            comparison: Comparison::LessThan,
            threshold: Threshold::Number(0.6),
            category: Category::Cost,
            weight: Severity::Medium,
            confidence: 0.90,
            component: "Training Infrastructure",
            title: "Low GPU Utilization",
            description: "Average GPU utilization is {value}",
            impact: "Underutilized GPUs waste compute and increase training costs",
            hint: "Increase batch size, optimize data loading and prefetching, profile GPU bottlenecks",
            bands: Some([0.6, 0.4, 0.2]),
            unit: Unit::Ratio,
            ..mlops.clone()
        },
        ThresholdRule {
            id: "training_failure_rate",
            metric: "training_failure_rate",
            threshold: Threshold::Number(0.10),
            category: Category::Reliability,
            weight: Severity::High,
            confidence: 0.87,
            component: "Training Pipeline",
            title: "High Training Failure Rate",
            description: "Training failure rate is {value}",
            impact: "Training failures waste resources and delay model development",
            hint: "Add checkpointing, validate data before training, review training logs for common errors",
            bands: Some([0.10, 0.25, 0.40]),
            unit: Unit::Ratio,
            config_key: Some(ThresholdKey::FailureRate),
            ..mlops.clone()
        },
        ThresholdRule {
            id: "data_drift",
            metric: "data_drift_score",
            threshold: Threshold::Number(0.1),
            category: Category::Quality,
            weight: Severity::High,
            confidence: 0.92,
            component: "Input Data",
            title: "Data Drift Detected",
            description: "Data drift score is {value}, exceeding threshold",
            impact: "Data drift causes model performance degradation and unreliable predictions",
            hint: "Retrain with recent data, set up automated retraining, investigate the root cause of drift",
            bands: Some([0.1, 0.2, 0.3]),
            unit: Unit::Score,
            ..mlops.clone()
        },
        ThresholdRule {
            id: "low_data_quality",
            metric: "data_quality_score",
            comparison: Comparison::LessThan,
            threshold: Threshold::Number(0.95),
            category: Category::Quality,
            weight: Severity::Medium,
            confidence: 0.85,
            component: "Input Data",
            title: "Low Data Quality",
            description: "Data quality score is {value}",
            impact: "Low data quality leads to poor model performance",
            hint: "Add data validation rules and quality checks to the pipeline",
            bands: Some([0.95, 0.90, 0.80]),
            unit: Unit::Ratio,
            ..mlops.clone()
        },
        ThresholdRule {
            id: "missing_values",
            metric: "missing_value_rate",
            threshold: Threshold::Number(0.05),
            category: Category::Quality,
            weight: Severity::Medium,
            confidence: 0.80,
            component: "Input Data",
            title: "High Missing Value Rate",
            description: "Missing value rate is {value}",
            impact: "Missing values reduce training effectiveness and prediction coverage",
            hint: "Implement imputation, investigate data collection, drop features with excessive gaps",
            bands: Some([0.05, 0.10, 0.20]),
            unit: Unit::Ratio,
            ..mlops.clone()
        },
        ThresholdRule {
            id: "inference_latency_p95",
            metric: "inference_latency_p95",
            threshold: Threshold::Number(100.0),
            category: Category::Performance,
            weight: Severity::High,
            confidence: 0.88,
            component: "Model Serving",
            title: "High Inference Latency",
            description: "P95 inference latency is {value}",
            impact: "High latency degrades user experience and may violate SLAs",
            hint: "Quantize or prune the model, batch requests, scale horizontally",
            bands: Some([100.0, 200.0, 400.0]),
            unit: Unit::Millis,
            ..mlops.clone()
        },
        ThresholdRule {
            id: "low_inference_throughput",
            metric: "inference_throughput",
            comparison: Comparison::LessThan,
            threshold: Threshold::Number(100.0),
            category: Category::Performance,
            weight: Severity::Medium,
            confidence: 0.83,
            component: "Model Serving",
            title: "Low Inference Throughput",
            description: "Inference throughput is {value}",
            impact: "Low throughput limits capacity and forces overprovisioning",
            hint: "Enable request batching, optimize preprocessing, use GPU inference",
            bands: Some([100.0, 50.0, 25.0]),
            unit: Unit::PerSecond,
            ..mlops.clone()
        },
        ThresholdRule {
            id: "inference_error_rate",
            metric: "inference_error_rate",
            threshold: Threshold::Number(0.01),
            category: Category::Reliability,
            weight: Severity::Critical,
            confidence: 0.95,
            component: "Model Serving",
            title: "High Inference Error Rate",
            description: "Inference error rate is {value}",
            impact: "Serving instability directly affects users",
            hint: "Add input validation and fallback paths, monitor serving health",
            bands: Some([0.01, 0.05, 0.10]),
            unit: Unit::Ratio,
            ..mlops.clone()
        },
        ThresholdRule {
            id: "untagged_experiments",
            metric: "untagged_experiment_ratio",
            threshold: Threshold::Number(0.3),
            category: Category::Quality,
            weight: Severity::Low,
            confidence: 0.75,
            component: "Experiment Tracking",
            title: "Poor Experiment Organization",
            description: "{value} of experiments lack proper tagging",
            impact: "Untagged experiments are hard to track and reproduce",
            hint: "Adopt a consistent tagging strategy and record experiment metadata",
            bands: Some([0.5, 0.7, 0.9]),
            unit: Unit::Ratio,
            ..mlops
        },
    ]
}

pub fn builtin_pattern_rules() -> Vec<PatternRule> {
    vec![
        PatternRule {
            id: "flaky_tests",
            pipeline: PipelineType::Devops,
            kind: PatternKind::Flakiness { prefix: "test." },
            category: Category::Reliability,
            weight: Severity::High,
            confidence: 0.85,
            component: "Test Suite",
            title: "Flaky Tests Detected",
            description: "Found {value} flaky tests with intermittent failures",
            impact: "Flaky tests waste time on false failures and may mask real issues",
            hint: "Look for timing issues, shared state and external dependencies in the listed tests",
            bands: Some([1.0, 3.0, 6.0]),
            unit: Unit::Count,
            min_depth: AnalysisDepth::Detailed,
        },
        PatternRule {
            id: "build_duration_regression",
            pipeline: PipelineType::Devops,
            kind: PatternKind::Regression {
                metric: "build_duration_avg",
            },
            category: Category::Performance,
            weight: Severity::Medium,
            confidence: 0.80,
            component: "CI/CD Pipeline",
            title: "Build Duration Regression",
            description: "Build duration is {value}x the recent baseline",
            impact: "Slower builds lengthen every feedback cycle",
            hint: "Compare recent dependency and build script changes against the baseline builds",
            bands: Some([1.5, 2.0, 3.0]),
            unit: Unit::Score,
            min_depth: AnalysisDepth::Detailed,
        },
        PatternRule {
            id: "data_drift_trend",
            pipeline: PipelineType::Mlops,
            kind: PatternKind::RisingTrend {
                metric: "data_drift_score",
            },
            category: Category::Quality,
            weight: Severity::High,
            confidence: 0.78,
            component: "Input Data",
            title: "Rising Data Drift",
            description: "Data drift score rose by {value} across consecutive samples",
            impact: "Sustained drift erodes model accuracy before thresholds trip",
            hint: "Schedule retraining and investigate upstream data changes",
            bands: Some([0.02, 0.05, 0.10]),
            unit: Unit::Score,
            min_depth: AnalysisDepth::Comprehensive,
        },
        PatternRule {
            id: "model_accuracy_degradation",
            pipeline: PipelineType::Mlops,
            kind: PatternKind::Degradation {
                metric: "model_accuracy",
            },
            category: Category::Quality,
            weight: Severity::High,
            confidence: 0.88,
            component: "ML Model",
            title: "Model Performance Degradation Detected",
            description: "Model accuracy dropped by {value} against the earlier window",
            impact: "Degraded model performance affects prediction quality and business outcomes",
            hint: "Investigate data drift, retrain with recent data, check for concept drift",
            bands: Some([0.05, 0.10, 0.20]),
            unit: Unit::Ratio,
            min_depth: AnalysisDepth::Comprehensive,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_rules_cover_both_pipelines() {
        let rules = builtin_threshold_rules();
        for pipeline in [PipelineType::Devops, PipelineType::Mlops] {
            assert!(
                rules.iter().any(|r| r.pipeline == pipeline),
                "No threshold rule for {pipeline}"
            );
        }
    }

    #[test]
    fn every_category_has_a_rule() {
        let rules = builtin_threshold_rules();
        for category in [
            Category::Performance,
            Category::Reliability,
            Category::Security,
            Category::Quality,
            Category::Cost,
        ] {
            assert!(
                rules.iter().any(|r| r.category == category),
                "No rule for category {category}"
            );
        }
    }

    #[test]
    fn percentage_rules_are_scaled_to_ratios() {
        for rule in builtin_threshold_rules() {
            if rule.unit == Unit::Percent {
                assert!(
                    (rule.scale - 0.01).abs() < f64::EPSILON,
                    "Rule {} reads a percentage without scaling",
                    rule.id
                );
            }
        }
    }

    #[test]
    fn pattern_rules_are_gated_above_basic() {
        for rule in builtin_pattern_rules() {
            assert!(
                rule.min_depth > AnalysisDepth::Basic,
                "Pattern rule {} must not run at basic depth",
                rule.id
            );
        }
    }
}
