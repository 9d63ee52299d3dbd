//! Direct illumination example.
//!
//! Renders a small room with an area light, a point light and a few
//! materials, then saves a PNG. Pass a JSON settings file as the first
//! argument to override the defaults.

use anyhow::Context;
use imagine_raytracer::{
    AreaLight, Camera, Colour, Dielectric, DirectIllumination, FinalAccumulator, Lambertian, LogHost,
    Matrix4, Mesh, Metal, OutputImage, Point, PointLight, RenderOutcome, RenderScheduler,
    RenderSettings, TriangleScene, Vector,
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            RenderSettings::from_json(&json)?
        }
        None => RenderSettings {
            width: 400,
            height: 300,
            antialiasing_samples: 3,
            ambient_occlusion: true,
            ambient_occlusion_samples: 4,
            ambient_occlusion_distance: 2.0,
            ..Default::default()
        },
    };

    let start = std::time::Instant::now();
    let scene = build_scene(&settings);
    log::info!("Scene built in {:?}", start.elapsed());

    let mut camera = Camera::new()
        .with_resolution(settings.width, settings.height)
        .with_position(Point::new(0.0, 1.5, 5.0), Point::new(0.0, 0.8, 0.0), Vector::new(0.0, 1.0, 0.0))
        .with_lens(45.0, 0.0, 5.0);
    camera.initialize();

    let scheduler = RenderScheduler::from_settings(&settings)?;
    let mut integrator =
        DirectIllumination::new(&scene, &scene, &camera, settings.clone(), FinalAccumulator::default());
    let mut image = OutputImage::new(settings.width, settings.height);

    let start = std::time::Instant::now();
    let outcome = scheduler.render(&mut integrator, &mut image, &LogHost)?;
    log::info!(
        "Rendered {}x{} on {} threads in {:?}",
        settings.width,
        settings.height,
        scheduler.thread_count(),
        start.elapsed()
    );
    if outcome == RenderOutcome::Cancelled {
        anyhow::bail!("render was cancelled");
    }

    let filename = "output.png";
    image.to_rgba8().save(filename).context("saving image")?;
    log::info!("Saved to {filename}");
    Ok(())
}

fn build_scene(settings: &RenderSettings) -> TriangleScene {
    let mut builder = TriangleScene::builder();
    builder.set_ray_epsilon(settings.ray_epsilon);
    builder.set_background(Colour::new(0.05, 0.05, 0.08));

    let white = builder.add_material(Lambertian::new(Colour::splat(0.73)));
    let red = builder.add_material(Lambertian::new(Colour::new(0.65, 0.05, 0.05)));
    let green = builder.add_material(Lambertian::new(Colour::new(0.12, 0.45, 0.15)));
    let metal = builder.add_material(Metal::new(Colour::new(0.8, 0.7, 0.6), 0.05));
    let glass = builder.add_material(Dielectric::new(1.5));
    let emitter = builder.add_material(Lambertian::emissive(Colour::ZERO, Colour::splat(4.0)));

    // Floor, back wall and the two side walls
    let walls = [
        (Point::new(-2.0, 0.0, 2.0), Vector::new(4.0, 0.0, 0.0), Vector::new(0.0, 0.0, -4.0), white),
        (Point::new(-2.0, 0.0, -2.0), Vector::new(4.0, 0.0, 0.0), Vector::new(0.0, 3.0, 0.0), white),
        (Point::new(-2.0, 0.0, 2.0), Vector::new(0.0, 0.0, -4.0), Vector::new(0.0, 3.0, 0.0), red),
        (Point::new(2.0, 0.0, -2.0), Vector::new(0.0, 0.0, 4.0), Vector::new(0.0, 3.0, 0.0), green),
    ];
    for (corner, edge_u, edge_v, material) in walls {
        builder.add_mesh(&Mesh::quad(corner, edge_u, edge_v).with_material(material), Matrix4::IDENTITY);
    }

    // Mirror panel leaning against the back wall and a glass pane in front
    let panel = Mesh::quad(Point::new(-0.5, 0.0, -0.5), Vector::new(1.0, 0.0, 0.0), Vector::new(0.0, 1.4, 0.0))
        .with_material(metal);
    builder.add_mesh(&panel, Matrix4::from_rotation_y(0.4) * Matrix4::from_translation(Vector::new(-0.6, 0.0, -0.8).into()));

    let pane = Mesh::quad(Point::new(-0.4, 0.0, 0.0), Vector::new(0.8, 0.0, 0.0), Vector::new(0.0, 0.8, 0.0))
        .with_material(glass);
    builder.add_mesh(&pane, Matrix4::from_translation(Vector::new(0.7, 0.0, 0.6).into()));

    // Ceiling light: emissive quad plus the light that samples it
    let corner = Point::new(-0.5, 2.95, -0.5);
    let (edge_u, edge_v) = (Vector::new(1.0, 0.0, 0.0), Vector::new(0.0, 0.0, 1.0));
    let light_object = builder.add_mesh(&Mesh::quad(corner, edge_u, edge_v).with_material(emitter), Matrix4::IDENTITY);
    builder.add_light(
        AreaLight::new(corner, edge_u, edge_v, Colour::ONE, 4.0)
            .with_samples(4)
            .with_object_id(light_object),
    );
    builder.add_light(PointLight::new(Point::new(1.2, 2.5, 1.5), Colour::new(1.0, 0.9, 0.8), 2.0));

    builder.build()
}
