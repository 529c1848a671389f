//! End-to-end visualization from a predictions file.

#![cfg(feature = "visualization")]

use image::{Rgb, RgbImage};
use synth_ocr::utils::visualization::{VisualizationConfig, Visualizer, load_predictions};

#[test]
fn predictions_file_renders_named_composites() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("img_AB9.png");
    RgbImage::from_pixel(32, 16, Rgb([40, 40, 40]))
        .save(&image_path)
        .unwrap();

    // Two sequences, three timesteps of 4x4 attention.
    let map = |peak: usize| -> Vec<Vec<f32>> {
        (0..4)
            .map(|y| (0..4).map(|x| if y * 4 + x == peak { 1.0 } else { 0.0 }).collect())
            .collect()
    };
    let entry = serde_json::json!([{
        "image_path": image_path,
        "attention_maps": [
            [map(0), map(5), map(10)],
            [map(15), map(3), map(12)],
        ],
        "predictions": [[10, 11, 9, 62], [36, 37, 62, 62]],
    }, {
        "image_path": dir.path().join("missing.png"),
        "attention_maps": [[map(0)]],
        "predictions": [[1, 62]],
    }]);
    let predictions_path = dir.path().join("predictions.json");
    std::fs::write(&predictions_path, entry.to_string()).unwrap();

    let out_dir = dir.path().join("outputs");
    let config = VisualizationConfig::default()
        .with_output_directory(&out_dir)
        .with_image_size([16, 16])
        .with_extension("png");
    let samples = load_predictions(&predictions_path).unwrap();
    let report = Visualizer::new(config).unwrap().run(samples).unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(
        report.written,
        vec![
            out_dir.join("AB9_ab_attention_map.png"),
            out_dir.join("AB9_ab_bounding_box.png"),
        ]
    );

    let attention = image::open(&report.written[0]).unwrap().to_rgb8();
    assert_eq!(attention.dimensions(), (3 * 16, 2 * 16));
    // Top-left cell peaks at its top-left corner, which is pushed towards red.
    let peak = attention.get_pixel(0, 0);
    assert!(peak[0] > peak[1]);
    // Far from any peak the base image is unchanged.
    assert_eq!(attention.get_pixel(15, 15), &Rgb([40, 40, 40]));

    let boxes = image::open(&report.written[1]).unwrap().to_rgb8();
    assert_eq!(boxes.dimensions(), (3 * 16, 2 * 16));
    assert_eq!(boxes.get_pixel(0, 0), &Rgb([255, 0, 0]));
}
