pub mod asset_cache;
pub mod font_resolver;
pub mod render_pipeline;
pub mod renderer_pool;

pub use asset_cache::{AssetCache, ResolvedAsset};
pub use font_resolver::{EmbeddedFont, FontIndex};
pub use render_pipeline::{PipelineOptions, RenderOutput, RenderPipeline, OUTPUT_FILENAME};
pub use renderer_pool::{PoolStatus, RendererPool};
