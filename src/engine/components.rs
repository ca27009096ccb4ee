use serde::{Deserialize, Serialize};

/// Logical pipeline stages used by the correlation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Build,
    Test,
    Deploy,
    InfraResourcePressure,
    Training,
    DataQuality,
    ModelPerformance,
    Serving,
}

/// Remediation family of a component, used to select optimization blueprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentClass {
    Build,
    Test,
    Deploy,
    Infrastructure,
    Kubernetes,
    Security,
    Model,
    Training,
    Data,
    Serving,
    Experiments,
    Platform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentProfile {
    pub name: &'static str,
    pub stage: Option<Stage>,
    pub class: ComponentClass,
}

const fn profile(
    name: &'static str,
    stage: Option<Stage>,
    class: ComponentClass,
) -> ComponentProfile {
    ComponentProfile { name, stage, class }
}

pub const PLATFORM_WIDE: &str = "Platform-Wide";

pub const COMPONENTS: &[ComponentProfile] = &[
    // DevOps
    profile("Build Process", Some(Stage::Build), ComponentClass::Build),
    profile("CI/CD Pipeline", Some(Stage::Build), ComponentClass::Build),
    profile("Test Suite", Some(Stage::Test), ComponentClass::Test),
    profile("Deployment Pipeline", Some(Stage::Deploy), ComponentClass::Deploy),
    profile(
        "Build Infrastructure",
        Some(Stage::InfraResourcePressure),
        ComponentClass::Infrastructure,
    ),
    profile("Dependencies/Code", None, ComponentClass::Security),
    profile("Security Scanning", None, ComponentClass::Security),
    profile("Kubernetes Cluster", None, ComponentClass::Kubernetes),
    profile("Kubernetes Scheduler", None, ComponentClass::Kubernetes),
    profile("Kubernetes Nodes", None, ComponentClass::Kubernetes),
    profile(
        "Kubernetes Deployments",
        Some(Stage::Deploy),
        ComponentClass::Kubernetes,
    ),
    profile(
        "Kubernetes Cluster Resources",
        Some(Stage::InfraResourcePressure),
        ComponentClass::Kubernetes,
    ),
    profile("Kubernetes Storage", None, ComponentClass::Kubernetes),
    profile("Service Mesh", None, ComponentClass::Kubernetes),
    // MLOps
    profile("ML Model", Some(Stage::ModelPerformance), ComponentClass::Model),
    profile("Training Pipeline", Some(Stage::Training), ComponentClass::Training),
    profile("Training Infrastructure", None, ComponentClass::Training),
    profile("Input Data", Some(Stage::DataQuality), ComponentClass::Data),
    profile("Model Serving", Some(Stage::Serving), ComponentClass::Serving),
    profile("Experiment Tracking", None, ComponentClass::Experiments),
    // Correlated
    profile("Build → Deploy", None, ComponentClass::Build),
    profile("Data Quality → Model Performance", None, ComponentClass::Data),
    profile("Infrastructure → Build", None, ComponentClass::Infrastructure),
    profile("Infrastructure → Training", None, ComponentClass::Infrastructure),
    profile(PLATFORM_WIDE, None, ComponentClass::Platform),
];

pub fn lookup(name: &str) -> Option<&'static ComponentProfile> {
    COMPONENTS.iter().find(|p| p.name == name)
}

pub fn stage_of(name: &str) -> Option<Stage> {
    lookup(name).and_then(|p| p.stage)
}

pub fn class_of(name: &str) -> Option<ComponentClass> {
    lookup(name).map(|p| p.class)
}
