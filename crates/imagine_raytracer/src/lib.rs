//! Imagine raytracer - CPU raytracing core.
//!
//! Rays with differentials, per-hit shading data, ambient occlusion and a
//! direct illumination integrator that renders tiles in parallel passes.
//! A triangle/BVH scene and a thin-lens camera are included so the core
//! can render on its own.

mod accumulator;
mod ambient_occlusion;
mod bvh;
mod camera;
mod error;
mod hit_result;
mod integrator;
mod light;
mod material;
mod ray;
mod raytracer;
mod renderer;
pub mod sampling;
mod scene;
mod settings;
mod shading_context;
mod tile;
mod triangle;

pub use accumulator::{Accumulator, FinalAccumulator, PixelSample, ProgressiveAccumulator};
pub use ambient_occlusion::RaytracerAmbientOcclusion;
pub use bvh::BvhNode;
pub use camera::Camera;
pub use error::{RenderError, RenderResult};
pub use hit_result::HitResult;
pub use integrator::{DirectIllumination, Integrator};
pub use light::{AreaLight, Light, LightSample, LightsAndSamples, PointLight};
pub use material::{
    luminance, reflect, refract, BsdfSample, Colour, Dielectric, Lambertian, Material, MaterialFlags, Metal,
};
pub use ray::{Ray, RayDifferentials, RayPayload, RayType};
pub use raytracer::{LogHost, Raytracer, RaytracerHost, SceneInterface};
pub use renderer::{colour_to_rgba, linear_to_gamma, OutputImage, RenderOutcome, RenderScheduler};
pub use scene::{SceneBuilder, TriangleScene};
pub use settings::{LightSamplingType, RenderSettings};
pub use shading_context::{PathState, ShadingContext};
pub use tile::{generate_tiles, RenderPass, RenderTask, TileInfo, TileResult, TileState};
pub use triangle::{Mesh, Triangle};

/// Re-export the geometric value types from imagine_math
pub use imagine_math::{Aabb, Interval, Matrix4, Matrix4Ext, Normal, Point, Vec2, Vec3, Vector, UV};
