//! Per-pixel outputs of the statistics workers on real tiles, including the
//! nodata policy for short series.

mod common;

use common::{NODATA, north_up, read_values, write_raster, write_uniform_series};
use tiletrend::{
    Analysis, GdalRasterReader, PipelineConfig, RasterDataType, RunOptions, Statistic,
    analyze_tiles, run_pipeline,
};

/// 3x1 tile over 10 bands:
/// pixel 0 = 1..=10, pixel 1 = one valid sample, pixel 2 = 4 valid samples
fn write_mixed_tile(path: &std::path::Path) {
    write_raster::<f32, _>(
        path,
        RasterDataType::Float32,
        (3, 1, 10),
        north_up(),
        Some(NODATA),
        |b, _, c| match c {
            0 => (b + 1) as f32,
            1 if b == 4 => 7.5,
            2 if b % 2 == 0 && b < 8 => b as f32,
            _ => NODATA as f32,
        },
    );
}

#[test]
fn trend_outputs_respect_minimum_samples() {
    let dir = tempfile::tempdir().unwrap();
    let tiles = dir.path().join("tiles");
    std::fs::create_dir_all(&tiles).unwrap();
    write_mixed_tile(&tiles.join("tile_0_0.tif"));

    let out = dir.path().join("out");
    let report = analyze_tiles(
        &tiles,
        &out,
        Analysis::Trend,
        vec![Statistic::MkZ, Statistic::SenSlope, Statistic::KendallTau],
        &PipelineConfig::default(),
    )
    .unwrap();
    assert!(report.is_complete_success());

    let z = read_values(&out.join("mk_z").join("mk_0_0.tif"), 1);
    let slope = read_values(&out.join("sen_slope").join("sen_0_0.tif"), 1);
    let tau = read_values(&out.join("kendall_tau").join("tau_0_0.tif"), 1);

    assert!(z[0] > 0.0);
    assert_eq!(slope[0], 1.0);
    assert_eq!(tau[0], 1.0);

    assert_eq!(z[1], NODATA);
    assert_eq!(slope[1], NODATA);
    assert_eq!(tau[1], NODATA);

    // pixel 2 = [0, 2, 4, 6] in valid-sequence order
    assert!(z[2] > 0.0);
    assert_eq!(slope[2], 2.0);

    let meta = GdalRasterReader::open(out.join("mk_z").join("mk_0_0.tif"))
        .unwrap()
        .metadata;
    assert_eq!(meta.bands, 1);
    assert_eq!(meta.data_type, RasterDataType::Float32);
    assert_eq!(meta.nodata, Some(NODATA));
    assert_eq!(meta.geotransform, north_up());
    assert_eq!(meta.metadata.get("STATISTIC").map(String::as_str), Some("mk_z"));
}

#[test]
fn change_point_outputs_three_way() {
    let dir = tempfile::tempdir().unwrap();
    let tiles = dir.path().join("tiles");
    std::fs::create_dir_all(&tiles).unwrap();
    // 20 bands: pixel 0 steps after band 10, pixel 1 is flat, pixel 2 has 4 valid samples
    write_raster::<f32, _>(
        &tiles.join("tile_2_5.tif"),
        RasterDataType::Float32,
        (3, 1, 20),
        north_up(),
        Some(NODATA),
        |b, _, c| match c {
            0 => {
                if b < 10 {
                    1.0
                } else {
                    10.0
                }
            }
            1 => 3.0,
            _ => {
                if b < 4 {
                    b as f32
                } else {
                    NODATA as f32
                }
            }
        },
    );

    let out = dir.path().join("out");
    let report = analyze_tiles(
        &tiles,
        &out,
        Analysis::ChangePoint,
        vec![Statistic::Pettitt, Statistic::PettittP],
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(report.succeeded.len(), 1);

    let position = read_values(&out.join("pettitt").join("pettitt_2_5.tif"), 1);
    let p = read_values(&out.join("pettitt_p").join("pettittp_2_5.tif"), 1);
    assert_eq!(position, vec![10.0, 0.0, NODATA]);
    assert!(p[0] < 0.05);
    assert_eq!(p[1], 1.0);
    assert_eq!(p[2], NODATA);
}

#[test]
fn undeclared_nodata_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let tiles = dir.path().join("tiles");
    std::fs::create_dir_all(&tiles).unwrap();
    write_raster::<i16, _>(
        &tiles.join("tile_0_0.tif"),
        RasterDataType::Int16,
        (2, 1, 6),
        north_up(),
        None,
        |b, _, c| if c == 1 && b > 0 { -9999 } else { (10 - b) as i16 },
    );

    let out = dir.path().join("out");
    analyze_tiles(&tiles, &out, Analysis::Trend, vec![], &PipelineConfig::default()).unwrap();

    let path = out.join("sen_slope").join("sen_0_0.tif");
    assert_eq!(read_values(&path, 1), vec![-1.0, NODATA]);
    let meta = GdalRasterReader::open(&path).unwrap().metadata;
    assert_eq!(meta.nodata, Some(NODATA));
}

#[test]
fn pipeline_produces_full_extent_mosaics() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stack.tif");
    let mut series = vec![1.0f32; 10];
    series.extend(vec![10.0f32; 10]);
    write_uniform_series(&input, 10, 7, &series);

    let config = PipelineConfig {
        tile_size: 4,
        workers: Some(2),
        ..Default::default()
    };
    let work = dir.path().join("work");
    let summary = run_pipeline(
        &input,
        &work,
        &RunOptions::new(Analysis::ChangePoint),
        &config,
    )
    .unwrap();

    assert_eq!(summary.split.tiles.len(), 6);
    assert_eq!(summary.analysis.succeeded.len(), 6);
    assert_eq!(summary.mosaics.len(), 1);
    let (stat, mosaic) = &summary.mosaics[0];
    assert_eq!(*stat, Statistic::Pettitt);
    assert_eq!(mosaic.output, work.join("pettitt.tif"));
    assert_eq!((mosaic.width, mosaic.height), (10, 7));
    assert_eq!(mosaic.geotransform, north_up());
    assert_eq!(read_values(&mosaic.output, 1), vec![10.0; 70]);
}

#[test]
fn pipeline_with_smoothing_keeps_trend() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stack.tif");
    let series: Vec<f32> = (0..16).map(|t| 2.0 * t as f32).collect();
    write_uniform_series(&input, 5, 5, &series);

    let config = PipelineConfig {
        tile_size: 3,
        ..Default::default()
    };
    let options = RunOptions {
        analysis: Analysis::Trend,
        statistics: vec![Statistic::SenSlope],
        smooth: true,
    };
    let work = dir.path().join("work");
    let summary = run_pipeline(&input, &work, &options, &config).unwrap();

    let smoothing = summary.smoothing.as_ref().unwrap();
    assert_eq!(smoothing.succeeded.len(), 4);
    let smoothed = work.join("smoothed").join("tile_1_1.tif");
    assert_eq!(GdalRasterReader::open(&smoothed).unwrap().metadata.bands, 16);
    // full-window positions of a linear series are reproduced exactly
    for v in read_values(&smoothed, 9) {
        assert!((v - 16.0).abs() < 1e-3, "smoothed {v}");
    }
    let slopes = read_values(&work.join("sen_slope.tif"), 1);
    assert_eq!(slopes.len(), 25);
    assert!(slopes.iter().all(|&v| v > 0.0));
}

#[test]
fn float32_sentinel_not_representable_in_f32_is_masked() {
    let sentinel = -9999.1;
    let dir = tempfile::tempdir().unwrap();
    let tiles = dir.path().join("tiles");
    std::fs::create_dir_all(&tiles).unwrap();
    // pixel 0 = [0, 1, 2, 3], pixel 1 = one valid sample
    write_raster::<f32, _>(
        &tiles.join("tile_0_0.tif"),
        RasterDataType::Float32,
        (2, 1, 4),
        north_up(),
        Some(sentinel),
        |b, _, c| match c {
            0 => b as f32,
            _ if b == 2 => 5.0,
            _ => sentinel as f32,
        },
    );

    let out = dir.path().join("out");
    let report = analyze_tiles(
        &tiles,
        &out,
        Analysis::Trend,
        vec![],
        &PipelineConfig::default(),
    )
    .unwrap();
    assert!(report.is_complete_success());

    let stored = sentinel as f32 as f64;
    let slope_path = out.join("sen_slope").join("sen_0_0.tif");
    let slope = read_values(&slope_path, 1);
    assert_eq!(slope[0], 1.0);
    assert_eq!(slope[1], stored);

    let declared = GdalRasterReader::open(&slope_path)
        .unwrap()
        .metadata
        .nodata
        .unwrap();
    assert_eq!(declared as f32, sentinel as f32);
}
