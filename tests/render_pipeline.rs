//! End-to-end tests: settings -> render -> pixmap on disk.

use std::fs;

use disc_trace::camera::BoundingDescriptor;
use disc_trace::config::{PipelineOptions, RenderSettings, RunConfig, PREFIX_VAR};
use disc_trace::engine::cpu::programs::{to_rgba8, BACKGROUND};
use disc_trace::engine::cpu::{CpuEngine, ProgramLibrary};
use disc_trace::engine::ProgramSet;
use disc_trace::render::{render, render_to_file, ImageSpec};
use disc_trace::scene::SceneSpec;
use disc_trace::util::{Vec3, Vec4};
use disc_trace::Error;

fn small_settings() -> RenderSettings {
    RenderSettings {
        width: 64,
        height: 48,
        ..RenderSettings::default()
    }
}

#[test]
fn test_render_to_file_writes_pixmap() {
    let dir = tempfile::tempdir().unwrap();
    let run = RunConfig::new(dir.path()).unwrap();
    let programs = ProgramSet::for_run(&run);
    let settings = small_settings();

    let path = render_to_file(&CpuEngine::new(), &run, &programs, &settings).unwrap();
    assert_eq!(path, dir.path().join("ppm").join("TitaniumPlate.ppm"));

    let bytes = fs::read(&path).unwrap();
    let header = b"P6\n64 48\n255\n";
    assert_eq!(bytes.len(), header.len() + 64 * 48 * 3);
    assert_eq!(&bytes[..header.len()], header);

    let img = ppm_writer::decode(&bytes).unwrap();
    assert_eq!((img.width, img.height), (64, 48));
    let bg = to_rgba8(BACKGROUND);
    assert_eq!(img.pixel(0, 0), [bg[0], bg[1], bg[2]]);
    assert_eq!(img.pixel(32, 24), [127, 127, 255]);
}

#[test]
fn test_file_matches_flipped_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let run = RunConfig::new(dir.path()).unwrap();
    let programs = ProgramSet::for_run(&run);
    let settings = small_settings();
    let engine = CpuEngine::new();

    let pixels = render(
        &engine,
        &settings.descriptor().unwrap(),
        settings.image().unwrap(),
        &programs,
        &settings.pipeline,
    )
    .unwrap();
    let path = render_to_file(&engine, &run, &programs, &settings).unwrap();
    let img = ppm_writer::decode(&fs::read(path).unwrap()).unwrap();

    for y in 0..48u32 {
        let src = pixels.row(47 - y);
        let rgb: Vec<u8> = src.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect();
        assert_eq!(img.row(y as usize), rgb.as_slice(), "row {y}");
    }
}

#[test]
fn test_zero_instances_rejected_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let run = RunConfig::new(dir.path()).unwrap();
    let settings = RenderSettings {
        pipeline: PipelineOptions {
            scene: SceneSpec {
                instances: 0,
                ..SceneSpec::default()
            },
            ..PipelineOptions::default()
        },
        ..small_settings()
    };
    let err = render_to_file(&CpuEngine::new(), &run, &ProgramSet::for_run(&run), &settings).unwrap_err();
    assert!(matches!(err, Error::EmptyScene));
    assert_eq!(err.exit_code(), 2);
    assert!(!run.output_path().exists());
}

#[test]
fn test_missing_module_is_resource_error() {
    let dir = tempfile::tempdir().unwrap();
    let run = RunConfig::new(dir.path()).unwrap();
    let engine = CpuEngine::with_library(ProgramLibrary::new());
    let err = render_to_file(&engine, &run, &ProgramSet::for_run(&run), &small_settings()).unwrap_err();
    assert!(matches!(err, Error::ProgramNotFound { ref symbol, .. } if symbol == "raygen"));
    assert_eq!(err.exit_code(), 3);
    assert!(!run.output_path().exists());
}

#[test]
fn test_flat_acceleration_matches_bvh() {
    let dir = tempfile::tempdir().unwrap();
    let run = RunConfig::new(dir.path()).unwrap();
    let programs = ProgramSet::for_run(&run);
    let engine = CpuEngine::new();
    let bvh = small_settings();
    let flat = PipelineOptions {
        scene: SceneSpec {
            acceleration: "NoAccel".to_string(),
            ..SceneSpec::default()
        },
        ..PipelineOptions::default()
    };
    let desc = bvh.descriptor().unwrap();
    let image = bvh.image().unwrap();
    let a = render(&engine, &desc, image, &programs, &bvh.pipeline).unwrap();
    let b = render(&engine, &desc, image, &programs, &flat).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_offset_descriptor_still_frames_the_disc() {
    let dir = tempfile::tempdir().unwrap();
    let run = RunConfig::new(dir.path()).unwrap();
    let programs = ProgramSet::for_run(&run);
    let settings = small_settings();

    // Camera moves up with the descriptor; the disc stays at the origin
    // so the view center still lands on it.
    let desc = BoundingDescriptor::from_center_extent(Vec4::new(0.0, 0.0, 0.5, 0.5)).unwrap();
    let px = render(
        &CpuEngine::new(),
        &desc,
        ImageSpec::new(64, 48).unwrap(),
        &programs,
        &settings.pipeline,
    )
    .unwrap();
    let center = px.pixel(32, 24);
    assert_eq!(center, &to_rgba8(Vec3::new(0.5, 0.5, 1.0)));
}

#[test]
fn test_prefix_from_env() {
    std::env::remove_var(PREFIX_VAR);
    assert!(matches!(RunConfig::from_env(), Err(Error::MissingEnv("PREFIX"))));

    let dir = tempfile::tempdir().unwrap();
    std::env::set_var(PREFIX_VAR, dir.path());
    let run = RunConfig::from_env().unwrap();
    assert_eq!(run.prefix(), dir.path());
    std::env::remove_var(PREFIX_VAR);
}
