//! Remediation templates keyed by issue category and component class.

use crate::insights::{Category, Effort, OptimizationType};

use super::components::ComponentClass;

#[derive(Debug, Clone, Copy)]
pub struct Blueprint {
    pub id: &'static str,
    pub category: Category,
    pub class: ComponentClass,
    pub title: &'static str,
    pub description: &'static str,
    pub kind: OptimizationType,
    pub effort: Effort,
    pub steps: &'static [&'static str],
    /// Signed percentage change expected per metric.
    pub deltas: &'static [(&'static str, f64)],
}

impl Blueprint {
    pub fn matches(&self, category: Category, class: ComponentClass) -> bool {
        self.category == category && self.class == class
    }
}

pub const BLUEPRINTS: &[Blueprint] = &[
    Blueprint {
        id: "build-caching",
        category: Category::Performance,
        class: ComponentClass::Build,
        title: "Implement Build Caching",
        description: "Reduce build times by caching dependencies and build artifacts",
        kind: OptimizationType::Time,
        effort: Effort::Medium,
        steps: &[
            "Enable dependency caching in the CI/CD system",
            "Implement Docker layer caching for containerized builds",
            "Cache compiled artifacts between builds",
            "Use distributed caching for multi-stage builds",
        ],
        deltas: &[("build_duration_avg", -40.0), ("build_cpu_avg", -20.0)],
    },
    Blueprint {
        id: "build-stabilization",
        category: Category::Reliability,
        class: ComponentClass::Build,
        title: "Stabilize the Build Process",
        description: "Remove the recurring causes of failed builds",
        kind: OptimizationType::Reliability,
        effort: Effort::Medium,
        steps: &[
            "Group recent build failures by error signature",
            "Quarantine tests that fail without related code changes",
            "Add pre-commit hooks for linting and unit tests",
            "Pin dependency versions to remove resolution drift",
        ],
        deltas: &[("build_failure_rate", -50.0), ("deployment_failure_rate", -25.0)],
    },
    Blueprint {
        id: "test-reliability",
        category: Category::Reliability,
        class: ComponentClass::Test,
        title: "Improve Test Suite Reliability",
        description: "Fix flaky tests and improve test infrastructure",
        kind: OptimizationType::Reliability,
        effort: Effort::High,
        steps: &[
            "Identify and isolate flaky tests",
            "Add proper test isolation and cleanup",
            "Implement retry logic for genuinely flaky external dependencies",
            "Use test containers for consistent test environments",
            "Add better error reporting and logging",
        ],
        deltas: &[("test_reliability", 80.0), ("false_positive_rate", -80.0)],
    },
    Blueprint {
        id: "blue-green-deployments",
        category: Category::Reliability,
        class: ComponentClass::Deploy,
        title: "Implement Blue-Green Deployments",
        description: "Reduce deployment risks with a zero-downtime deployment strategy",
        kind: OptimizationType::Reliability,
        effort: Effort::High,
        steps: &[
            "Set up parallel production environments (blue/green)",
            "Implement health checks and automated validation",
            "Configure the load balancer for traffic switching",
            "Add automated rollback triggers",
            "Implement comprehensive deployment monitoring",
        ],
        deltas: &[("deployment_success_rate", 30.0), ("rollback_time", -90.0)],
    },
    Blueprint {
        id: "resource-allocation",
        category: Category::Performance,
        class: ComponentClass::Infrastructure,
        title: "Optimize Resource Allocation",
        description: "Right-size build agents and optimize resource usage",
        kind: OptimizationType::Cost,
        effort: Effort::Medium,
        steps: &[
            "Analyze actual resource usage patterns",
            "Implement autoscaling for build agents",
            "Use spot instances for non-critical builds",
            "Optimize container resource limits",
            "Schedule resource-intensive jobs during off-peak hours",
        ],
        deltas: &[("infrastructure_cost", -30.0), ("resource_efficiency", 35.0)],
    },
    Blueprint {
        id: "infrastructure-capacity",
        category: Category::Reliability,
        class: ComponentClass::Infrastructure,
        title: "Protect Shared Infrastructure Capacity",
        description: "Keep resource pressure in one workload from failing another",
        kind: OptimizationType::Reliability,
        effort: Effort::Medium,
        steps: &[
            "Set resource quotas per workload",
            "Enable autoscaling for shared runners",
            "Separate CI and training capacity pools",
            "Alert on sustained resource saturation",
        ],
        deltas: &[("build_failure_rate", -30.0), ("training_failure_rate", -30.0)],
    },
    Blueprint {
        id: "kubernetes-best-practices",
        category: Category::Reliability,
        class: ComponentClass::Kubernetes,
        title: "Implement Kubernetes Best Practices",
        description: "Apply production-ready Kubernetes configurations and observability",
        kind: OptimizationType::Reliability,
        effort: Effort::Medium,
        steps: &[
            "Configure resource requests and limits for all pods",
            "Implement liveness and readiness probes",
            "Set up Horizontal Pod Autoscaler (HPA) for dynamic scaling",
            "Configure Pod Disruption Budgets (PDB) for high availability",
            "Implement network policies",
            "Set up cluster monitoring and log aggregation",
        ],
        deltas: &[
            ("pod_failure_rate", -50.0),
            ("availability", 30.0),
            ("recovery_time", -60.0),
        ],
    },
    Blueprint {
        id: "kubernetes-resource-utilization",
        category: Category::Performance,
        class: ComponentClass::Kubernetes,
        title: "Optimize Kubernetes Resource Utilization",
        description: "Right-size pods and implement efficient autoscaling strategies",
        kind: OptimizationType::Cost,
        effort: Effort::Medium,
        steps: &[
            "Compare actual resource usage with requests using the metrics server",
            "Right-size pod requests and limits based on actual usage",
            "Implement Vertical Pod Autoscaler (VPA) for automatic sizing",
            "Use the cluster autoscaler for node-level scaling",
            "Implement resource quotas per namespace",
        ],
        deltas: &[("infrastructure_cost", -35.0), ("resource_waste", -45.0)],
    },
    Blueprint {
        id: "kubernetes-deployment-speed",
        category: Category::Performance,
        class: ComponentClass::Kubernetes,
        title: "Improve Kubernetes Deployment Speed",
        description: "Optimize container images and rollout strategies",
        kind: OptimizationType::Performance,
        effort: Effort::Medium,
        steps: &[
            "Optimize container images with multi-stage builds",
            "Use rolling updates with proper readiness checks",
            "Configure an appropriate terminationGracePeriodSeconds",
            "Set up a local container registry cache",
        ],
        deltas: &[("deployment_time", -50.0), ("deployment_success_rate", 25.0)],
    },
    Blueprint {
        id: "dependency-patching",
        category: Category::Security,
        class: ComponentClass::Security,
        title: "Patch Vulnerable Dependencies",
        description: "Remove known vulnerabilities and keep them from returning",
        kind: OptimizationType::Reliability,
        effort: Effort::Low,
        steps: &[
            "Upgrade dependencies with critical advisories first",
            "Enable automated dependency update pull requests",
            "Fail the pipeline on new critical findings",
            "Re-run the security scan after patching",
        ],
        deltas: &[
            ("critical_vulnerabilities", -100.0),
            ("high_vulnerabilities", -80.0),
        ],
    },
    Blueprint {
        id: "inference-optimization",
        category: Category::Performance,
        class: ComponentClass::Serving,
        title: "Optimize Model for Inference",
        description: "Apply model optimization techniques to reduce latency and improve throughput",
        kind: OptimizationType::Performance,
        effort: Effort::Medium,
        steps: &[
            "Apply model quantization (INT8 or mixed precision)",
            "Prune unnecessary weights and connections",
            "Use an optimized runtime for serving",
            "Implement dynamic batching",
            "Profile and optimize the preprocessing pipeline",
        ],
        deltas: &[
            ("inference_latency_p95", -40.0),
            ("inference_throughput", 200.0),
            ("serving_cost", -30.0),
        ],
    },
    Blueprint {
        id: "serving-hardening",
        category: Category::Reliability,
        class: ComponentClass::Serving,
        title: "Harden Model Serving",
        description: "Contain inference errors before they reach users",
        kind: OptimizationType::Reliability,
        effort: Effort::Medium,
        steps: &[
            "Validate inference inputs against the training schema",
            "Serve a fallback model when the primary model errors",
            "Add circuit breakers around downstream feature stores",
            "Alert on error-rate spikes per model version",
        ],
        deltas: &[("inference_error_rate", -70.0)],
    },
    Blueprint {
        id: "data-quality-monitoring",
        category: Category::Quality,
        class: ComponentClass::Data,
        title: "Implement Automated Data Quality Monitoring",
        description: "Set up continuous data quality monitoring and alerting",
        kind: OptimizationType::Quality,
        effort: Effort::Medium,
        steps: &[
            "Define data quality metrics and thresholds",
            "Implement an automated data validation pipeline",
            "Set up data drift detection monitors",
            "Create alerting for quality violations",
            "Build a data profiling dashboard",
        ],
        deltas: &[("data_issue_detection", 80.0), ("model_reliability", 30.0)],
    },
    Blueprint {
        id: "automated-retraining",
        category: Category::Quality,
        class: ComponentClass::Model,
        title: "Implement Automated Model Retraining Pipeline",
        description: "Retrain automatically on performance degradation or data drift",
        kind: OptimizationType::Reliability,
        effort: Effort::High,
        steps: &[
            "Define retraining triggers (drift, performance drop, schedule)",
            "Implement an automated data preparation pipeline",
            "Set up automated training with hyperparameter optimization",
            "Implement automated model validation and testing",
            "Deploy through A/B testing with rollback",
        ],
        deltas: &[
            ("model_freshness", 90.0),
            ("manual_effort", -90.0),
            ("downtime", -50.0),
        ],
    },
    Blueprint {
        id: "distributed-training",
        category: Category::Performance,
        class: ComponentClass::Training,
        title: "Implement Distributed Training",
        description: "Speed up training with data-parallel or model-parallel execution",
        kind: OptimizationType::Performance,
        effort: Effort::High,
        steps: &[
            "Evaluate distributed training frameworks",
            "Refactor training code for distributed execution",
            "Set up multi-GPU or multi-node infrastructure",
            "Optimize data loading for distributed training",
            "Validate distributed training convergence",
        ],
        deltas: &[("training_duration_avg", -60.0), ("training_throughput", 250.0)],
    },
    Blueprint {
        id: "training-resilience",
        category: Category::Reliability,
        class: ComponentClass::Training,
        title: "Make Training Runs Resilient",
        description: "Stop losing training runs to recoverable failures",
        kind: OptimizationType::Reliability,
        effort: Effort::Medium,
        steps: &[
            "Checkpoint training state at regular intervals",
            "Validate input data before launching a run",
            "Add memory monitoring to training jobs",
            "Retry runs that fail on transient infrastructure errors",
        ],
        deltas: &[("training_failure_rate", -60.0)],
    },
    Blueprint {
        id: "ml-cost-optimization",
        category: Category::Cost,
        class: ComponentClass::Training,
        title: "Optimize Training and Inference Costs",
        description: "Reduce cloud costs through resource optimization and efficient scheduling",
        kind: OptimizationType::Cost,
        effort: Effort::Medium,
        steps: &[
            "Use spot instances for training workloads",
            "Increase batch sizes to raise GPU utilization",
            "Schedule training during off-peak hours",
            "Use reserved instances for baseline capacity",
            "Implement resource usage monitoring and alerts",
        ],
        deltas: &[("ml_infrastructure_cost", -35.0), ("gpu_utilization_avg", 40.0)],
    },
    Blueprint {
        id: "experiment-hygiene",
        category: Category::Quality,
        class: ComponentClass::Experiments,
        title: "Standardize Experiment Tracking",
        description: "Make experiments searchable and reproducible",
        kind: OptimizationType::Quality,
        effort: Effort::Low,
        steps: &[
            "Define a required tag set for every experiment",
            "Record dataset and code versions with each run",
            "Use meaningful experiment names",
            "Document the purpose of each experiment",
        ],
        deltas: &[("untagged_experiment_ratio", -80.0)],
    },
    Blueprint {
        id: "platform-root-cause-analysis",
        category: Category::Reliability,
        class: ComponentClass::Platform,
        title: "Run a Platform Reliability Review",
        description: "Address reliability problems that span pipelines at the platform level",
        kind: OptimizationType::Reliability,
        effort: Effort::High,
        steps: &[
            "Correlate incident timelines across pipelines",
            "Identify shared dependencies and infrastructure",
            "Define platform-level SLOs",
            "Schedule a cross-team reliability review",
        ],
        deltas: &[("incident_rate", -40.0)],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::components::COMPONENTS;
    use std::collections::HashSet;

    #[test]
    fn blueprint_ids_are_unique() {
        let ids: HashSet<&str> = BLUEPRINTS.iter().map(|b| b.id).collect();
        assert_eq!(ids.len(), BLUEPRINTS.len(), "Duplicate blueprint id");
    }

    #[test]
    fn every_blueprint_has_steps_and_deltas() {
        for blueprint in BLUEPRINTS {
            assert!(!blueprint.steps.is_empty(), "{} has no steps", blueprint.id);
            assert!(!blueprint.deltas.is_empty(), "{} has no deltas", blueprint.id);
        }
    }

    #[test]
    fn every_component_class_has_a_blueprint() {
        for profile in COMPONENTS {
            assert!(
                BLUEPRINTS.iter().any(|b| b.class == profile.class),
                "No blueprint for class of {}",
                profile.name
            );
        }
    }
}
