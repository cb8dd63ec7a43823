mod engine;
mod input;
mod loop_runner;
mod metrics;
mod object;
mod physics;
mod rendering;
mod scene;

pub use engine::{Application, EngineContext};
pub use input::{InputAction, InputSnapshot};
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, SLOW_FRAME_ENV_VAR};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use object::{
    Behavior, BehaviorInfo, BehaviorKind, Collision, GameObject, InfoValue, ObjectContext,
    ObjectId, ObjectLookup, WorldTransform,
};
pub use physics::{
    BodyHandle, BodyKind, ColliderOutline, ContactEvent, PhysicsConfig, PhysicsWorld, RayHit,
};
pub use rendering::{
    perspective, project_to_screen, Batch, BufferWrite, Cursor, DebugDraw, FrameUniforms,
    GeometryUpload, Light, LightBuffer, LightKind, LineVertex, Material, Mesh, RasterState,
    RasterTarget, RenderBackend, RenderContext, Renderer, ScreenPoint, TextureError,
    TextureHandle, TextureImage, TextureStore, Vertex, Viewport, MAX_LIGHTS,
};
pub use scene::{FrameContext, Scene, SceneManager, SceneWorld};
