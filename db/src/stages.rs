//! The stage registry: the canonical ordered list of stages every new
//! pipeline is created with. Adding or removing a stage type is a change
//! here, not in the status-update protocol.

pub struct StageDef {
    pub name: &'static str,
    pub description: &'static str,
}

pub const DEFAULT_STAGES: &[StageDef] = &[
    StageDef {
        name: "Data Generation",
        description: "Pipeline stage: Data Generation",
    },
    StageDef {
        name: "Data Ingestion",
        description: "Pipeline stage: Data Ingestion",
    },
    StageDef {
        name: "Spark Processing",
        description: "Pipeline stage: Spark Processing",
    },
    StageDef {
        name: "DBT Transformation",
        description: "Pipeline stage: DBT Transformation",
    },
    StageDef {
        name: "Data Export",
        description: "Pipeline stage: Data Export",
    },
];

pub fn default_stages() -> &'static [StageDef] {
    DEFAULT_STAGES
}
