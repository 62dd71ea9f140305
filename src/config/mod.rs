mod toolkit_config;

pub use toolkit_config::{
    expand_tilde, CollectSection, CollectorOptions, ExecutionSection, HardeningOptions, JournaldOptions,
    LogsSection, OutputSection, ProcessOptions, RedactSection, ResourceOptions, RunOverrides, ServiceSection,
    ToolkitConfig, PLACEHOLDER_UNIT,
};
