use compute::{default_specs, MockCpu, WorkerSpec};
use fractal::Vec3;
use render::scheduler::is_visible;
use render::{InputSample, Key, RenderSettings, Viewer};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn small_settings() -> RenderSettings {
    RenderSettings {
        min_tex: 4,
        first_pass_tex: 8,
        max_tex: 32,
        empty_stop_tex: 8,
        ..RenderSettings::default()
    }
}

fn viewer(settings: RenderSettings, mock: MockCpu, workers: &[WorkerSpec]) -> Viewer {
    Viewer::new(settings, Arc::new(mock), workers, 48, 32).unwrap()
}

/// Ticks with no input until nothing is left to do. Returns the tick count.
fn run_until_settled(viewer: &mut Viewer, mut check: impl FnMut(&Viewer)) -> usize {
    let idle = InputSample::idle(1.0 / 60.0);
    for n in 1..5_000 {
        viewer.tick(&idle, Instant::now());
        check(viewer);
        if viewer.is_settled() {
            return n;
        }
        viewer.wait_for_tiles(Duration::from_millis(200));
        check(viewer);
    }
    panic!("viewer never settled: {viewer:?}");
}

#[test]
fn default_camera_settles_with_every_visible_tile_computed() {
    let mut viewer = viewer(small_settings(), MockCpu::new(0.5), &default_specs(3));
    assert_eq!(viewer.camera().position, Vec3::new(0.0, 0.0, -1.1));
    run_until_settled(&mut viewer, |_| {});

    assert_eq!(viewer.in_flight(), 0);
    assert_eq!(viewer.hierarchy().busy_tiles(), 0);
    // The ball sits within the root radius, so one finer shell was added.
    assert_eq!(viewer.hierarchy().active_count(), 2);

    let view = viewer.view();
    let inner = viewer.hierarchy().innermost();
    let mut visible = 0;
    for tile in inner.tiles() {
        if is_visible(&view, inner, tile) {
            visible += 1;
            assert!(tile.is_current(inner.center()));
            assert!(tile.tex_size() == 32 || (tile.empty && tile.tex_size() == 8));
        }
    }
    assert!(visible > 0);
    assert!(viewer.frames_drawn() > 0);
    assert!(viewer.frame().pixels().any(|p| p.0 == [40, 90, 200, 255]));
}

#[test]
fn at_most_one_job_per_tile() {
    let mock = MockCpu::new(0.5).with_delay(Duration::from_millis(2));
    let mut viewer = viewer(small_settings(), mock, &default_specs(4));
    run_until_settled(&mut viewer, |v| {
        // Every in-flight job marks exactly one distinct tile busy.
        assert_eq!(v.hierarchy().busy_tiles(), v.in_flight());
        assert!(v.in_flight() <= 4);
    });
}

#[test]
fn nothing_near_means_no_growth() {
    let settings = RenderSettings { start_position: [0.0, 0.0, -3.0], ..small_settings() };
    let mut viewer = viewer(settings, MockCpu::new(0.05), &default_specs(2));
    let mut changes = 0;
    let idle = InputSample::idle(1.0 / 60.0);
    for _ in 0..200 {
        let report = viewer.tick(&idle, Instant::now());
        assert!(!report.grown);
        changes += usize::from(report.camera_changed);
        if viewer.is_settled() {
            break;
        }
        viewer.wait_for_tiles(Duration::from_millis(200));
    }
    assert!(viewer.is_settled());
    assert_eq!(viewer.hierarchy().len(), 1);
    assert_eq!(changes, 1);
}

#[test]
fn shell_count_stays_bounded_while_flying() {
    let mock = MockCpu::new(0.5).with_delay(Duration::from_millis(1));
    let mut viewer = viewer(small_settings(), mock, &default_specs(3));
    let mut previous = viewer.hierarchy().active_count();
    let mut resets = 0;
    for i in 0..300 {
        let keys = if i % 50 < 40 { vec![Key::Forward] } else { Vec::new() };
        let pointer = Some((0.5 + 0.001 * f64::from(i % 7), 0.5));
        let report = viewer.tick(&InputSample { pointer, keys, dt: 0.05 }, Instant::now());
        let active = viewer.hierarchy().active_count();
        assert!(active <= 20 && viewer.hierarchy().len() <= 20);
        if report.reset {
            resets += 1;
        } else {
            // Without a reset the active count only ever grows.
            assert!(active >= previous);
        }
        previous = active;
        viewer.wait_for_tiles(Duration::from_millis(5));
    }
    assert!(resets > 0);
    assert!(viewer.camera().position.length() <= 4.0 + 1e-9);
}

#[test]
fn failed_jobs_are_retried() {
    let mut viewer = viewer(small_settings(), MockCpu::new(0.5).failing_first(3), &default_specs(2));
    run_until_settled(&mut viewer, |_| {});
    assert_eq!(viewer.scheduler().failed(), 3);
    assert_eq!(viewer.hierarchy().busy_tiles(), 0);
}

#[test]
fn redraws_are_throttled_between_camera_changes() {
    let mock = MockCpu::new(0.5);
    let mut viewer = viewer(small_settings(), mock, &default_specs(2));
    let idle = InputSample::idle(0.0);
    let t0 = Instant::now();
    assert!(viewer.tick(&idle, t0).redrawn);
    assert!(viewer.wait_for_tiles(Duration::from_secs(5)) > 0);
    assert!(!viewer.tick(&idle, t0 + Duration::from_millis(50)).redrawn);
    assert!(viewer.tick(&idle, t0 + Duration::from_millis(250)).redrawn);

    viewer.resize(20, 10);
    let report = viewer.tick(&idle, t0 + Duration::from_millis(260));
    assert!(report.camera_changed && report.redrawn);
    assert_eq!(viewer.frame().dimensions(), (20, 10));
}

#[test]
fn location_jump_and_round_trip() {
    let mut viewer = viewer(small_settings(), MockCpu::default(), &default_specs(1));
    assert_eq!(viewer.location(), "mandelbulb;0;0;-1.1");
    assert!(!viewer.set_location("#mandelbox;1;2;3"));
    assert_eq!(viewer.camera().position, Vec3::new(0.0, 0.0, -1.1));

    let target = Vec3::new(0.25, -0.125, -2.0 / 3.0);
    let fragment = format!("#{}", render::location::encode(target));
    assert!(viewer.set_location(&fragment));
    let report = viewer.tick(&InputSample::idle(0.0), Instant::now());
    assert!(report.camera_changed);
    assert_eq!(viewer.camera().position, target);
    assert_eq!(viewer.hierarchy().innermost().center(), target);
    assert_eq!(render::location::parse(&viewer.location()), Some(target));
}
