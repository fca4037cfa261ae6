pub mod pipeline;

pub use pipeline::{
    GenerationParams, MarketParams, NarrativeParams, PipelineConfig, ProviderEndpoint,
    ProvidersConfig,
};
