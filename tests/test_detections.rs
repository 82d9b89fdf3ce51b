mod common;

use anyhow::Result;
use common::*;
use geotiles::{DetectionRecord, GeoError, Pipeline, PipelineConfig, RunSummary, Stages};

fn has_geo_error(err: &anyhow::Error, check: impl Fn(&GeoError) -> bool) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<GeoError>().is_some_and(&check))
}

#[test]
fn test_pixel_boxes_exported_as_lon_lat() -> Result<()> {
    let ws = Workspace::new()?;
    SyntheticTiff::wgs84(300, 300, 0.0001).write(&ws.scene("scene.tif"), textured)?;

    let mirror = ws.dir.path().join("front/public/detections/detections.json");
    let config = PipelineConfig {
        detections_mirror: Some(mirror.clone()),
        ..ws.config()
    };
    let pipeline = Pipeline::new(config)
        .with_detector(Box::new(FakeDetector::single(100.0, 100.0, 200.0, 200.0, "ship", 0.876)));
    let report = pipeline.run_detections()?;
    assert_eq!(report.detections.len(), 1);

    let primary = std::fs::read_to_string(ws.output.join("detections.json"))?;
    assert_eq!(primary, std::fs::read_to_string(&mirror)?);

    let records: Vec<DetectionRecord> = serde_json::from_str(&primary)?;
    let rec = &records[0];
    assert_eq!(rec.file, "scene.tif");
    assert_eq!(rec.label, "ship");
    assert_eq!(rec.score, 0.88);
    assert!((rec.bbox.min_lon - 4.01).abs() < 1e-9);
    assert!((rec.bbox.max_lon - 4.02).abs() < 1e-9);
    assert!((rec.bbox.min_lat - 51.98).abs() < 1e-9);
    assert!((rec.bbox.max_lat - 51.99).abs() < 1e-9);
    assert!((rec.center.lon - 4.015).abs() < 1e-9);
    assert!((rec.center.lat - 51.985).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_summary_written_with_average() -> Result<()> {
    let ws = Workspace::new()?;
    for name in ["a.tif", "b.tif"] {
        SyntheticTiff::wgs84(32, 32, 0.0001).write(&ws.scene(name), textured)?;
    }

    let detector = FakeDetector::single(1.0, 1.0, 5.0, 5.0, "vehicle", 0.5);
    let report = Pipeline::new(ws.config())
        .with_detector(Box::new(detector))
        .run_detections()?;

    let summary: RunSummary = serde_json::from_str(&std::fs::read_to_string(ws.output.join("metrics.json"))?)?;
    assert_eq!(summary.num_images, 2);
    assert_eq!(summary.num_detections, 2);
    let avg = summary.avg_seconds_per_image.expect("average for a non-empty batch");
    assert!((avg - summary.total_seconds / 2.0).abs() < 1e-12);

    let in_memory = report.summary.clone().expect("summary for a detection run");
    assert_eq!(in_memory.avg_seconds_per_image, Some(in_memory.total_seconds / 2.0));

    // Processing order: file by file
    let files: Vec<&str> = report.detections.iter().map(|d| d.file.as_str()).collect();
    assert_eq!(files, vec!["a.tif", "b.tif"]);
    Ok(())
}

#[test]
fn test_empty_batch_reports_missing_crs() -> Result<()> {
    let ws = Workspace::new()?;
    let pipeline = Pipeline::new(ws.config()).with_detector(Box::new(FakeDetector { boxes: vec![] }));

    let err = pipeline.run_detections().unwrap_err();
    assert!(has_geo_error(&err, |e| matches!(e, GeoError::NoCrs)));
    assert!(!ws.output.join("detections.json").exists());
    assert!(!ws.output.join("metrics.json").exists());
    Ok(())
}

#[test]
fn test_empty_full_run_writes_no_json() -> Result<()> {
    let ws = Workspace::new()?;
    let pipeline = Pipeline::new(ws.config()).with_detector(Box::new(FakeDetector { boxes: vec![] }));

    let err = pipeline.run_stages(Stages::All).unwrap_err();
    assert!(has_geo_error(&err, |e| matches!(e, GeoError::NoCrs)));
    assert!(!ws.output.join("tiles/tiles.json").exists());
    assert!(!ws.output.join("detections.json").exists());
    assert!(!ws.output.join("metrics.json").exists());
    Ok(())
}

#[test]
fn test_all_files_skipped_writes_no_json() -> Result<()> {
    let ws = Workspace::new()?;
    std::fs::write(ws.scene("broken.tif"), b"broken")?;

    let config = PipelineConfig {
        skip_invalid: true,
        ..ws.config()
    };
    let pipeline = Pipeline::new(config).with_detector(Box::new(FakeDetector { boxes: vec![] }));
    let err = pipeline.run().unwrap_err();
    assert!(has_geo_error(&err, |e| matches!(e, GeoError::NoCrs)));
    assert!(!ws.output.join("tiles/tiles.json").exists());
    Ok(())
}

#[test]
fn test_default_config_writes_two_copies() -> Result<()> {
    let ws = Workspace::new()?;
    SyntheticTiff::wgs84(64, 64, 0.0001).write(&ws.scene("scene.tif"), textured)?;

    let config = ws.config();
    assert_eq!(config.detections_mirror, None);
    Pipeline::new(config)
        .with_detector(Box::new(FakeDetector::single(8.0, 8.0, 24.0, 24.0, "windmill", 0.6)))
        .run_detections()?;

    let primary = std::fs::read_to_string(ws.output.join("detections.json"))?;
    let mirror = std::fs::read_to_string(ws.dir.path().join("front/public/detections/detections.json"))?;
    assert_eq!(primary, mirror);
    let records: Vec<DetectionRecord> = serde_json::from_str(&mirror)?;
    assert_eq!(records.len(), 1);
    Ok(())
}

#[test]
fn test_mixed_crs_batch_rejected() -> Result<()> {
    let ws = Workspace::new()?;
    SyntheticTiff::wgs84(16, 16, 0.0001).write(&ws.scene("a.tif"), textured)?;
    SyntheticTiff::wgs84(16, 16, 10.0)
        .with_epsg(Some(32631))
        .write(&ws.scene("b.tif"), textured)?;

    let pipeline = Pipeline::new(ws.config())
        .with_detector(Box::new(FakeDetector::single(1.0, 1.0, 2.0, 2.0, "dam", 0.9)));
    let err = pipeline.run_detections().unwrap_err();
    assert!(has_geo_error(&err, |e| matches!(e, GeoError::CrsMismatch { .. })));
    Ok(())
}

#[test]
fn test_unreadable_raster_fails_fast() -> Result<()> {
    let ws = Workspace::new()?;
    SyntheticTiff::wgs84(16, 16, 0.0001).write(&ws.scene("a.tif"), textured)?;
    std::fs::write(ws.scene("b.tif"), b"broken")?;

    let pipeline = Pipeline::new(ws.config()).with_detector(Box::new(FakeDetector { boxes: vec![] }));
    assert!(pipeline.run_detections().is_err());
    assert!(!ws.output.join("detections.json").exists());
    Ok(())
}

#[test]
fn test_skip_invalid_continues() -> Result<()> {
    let ws = Workspace::new()?;
    SyntheticTiff::wgs84(16, 16, 0.0001).write(&ws.scene("a.tif"), textured)?;
    std::fs::write(ws.scene("b.tif"), b"broken")?;

    let config = PipelineConfig {
        skip_invalid: true,
        ..ws.config()
    };
    let report = Pipeline::new(config)
        .with_detector(Box::new(FakeDetector::single(1.0, 1.0, 2.0, 2.0, "bridge", 0.7)))
        .run_detections()?;

    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.skipped, vec![ws.scene("b.tif")]);
    assert_eq!(report.summary.map(|s| s.num_images), Some(1));
    Ok(())
}

#[test]
fn test_full_run_reads_each_scene_once() -> Result<()> {
    let ws = Workspace::new()?;
    SyntheticTiff::wgs84(32, 32, 0.0001).write(&ws.scene("scene.tif"), textured)?;

    let debug_dir = ws.dir.path().join("debug");
    let report = Pipeline::new(ws.config())
        .with_detector(Box::new(FakeDetector::single(4.0, 4.0, 12.0, 12.0, "chimney", 0.95)))
        .with_debug(debug_dir.clone())?
        .run_stages(Stages::All)?;

    assert_eq!(report.tiles.len(), 1);
    assert_eq!(report.detections.len(), 1);
    assert!(ws.output.join("tiles/tiles.json").exists());
    assert!(ws.output.join("tiles/scene.png").exists());
    assert!(ws.output.join("detections.json").exists());
    assert!(ws.output.join("metrics.json").exists());
    assert!(debug_dir.join("scene_detections.png").exists());
    Ok(())
}
