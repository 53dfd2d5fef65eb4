use ndarray::Array3;

use hyperspec_core::crop::{trim_invalid_border, CropDb, CropRect};
use hyperspec_core::cube::Cube;
use hyperspec_core::error::HyperspecError;

#[test]
fn test_crop_db_reads_cropper_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bounds.json");
    std::fs::write(
        &path,
        r#"{"2023-03-09_015": [[49.7, 157.82], [472.23, 153.13], [471.23, 471.6], [50.7, 472.54]],
            "2023-03-09_016": [[10, 10], [90, 10], [90, 60], [10, 60]]}"#,
    )
    .unwrap();

    let db = CropDb::load(&path).unwrap();
    assert_eq!(db.len(), 2);
    assert_eq!(
        db.bounds("2023-03-09_015").unwrap(),
        CropRect {
            x: 50,
            y: 153,
            width: 422,
            height: 320
        }
    );
    assert_eq!(
        db.bounds("2023-03-09_016").unwrap(),
        CropRect {
            x: 10,
            y: 10,
            width: 80,
            height: 50
        }
    );
}

#[test]
fn test_crop_db_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bounds.json");

    let mut db = CropDb::default();
    db.insert("b", &[[1.0, 2.0], [30.0, 2.0], [30.0, 40.0], [1.0, 40.0]]);
    db.insert("a", &[[0.0, 0.0], [5.0, 5.0]]);
    db.save(&path).unwrap();

    let loaded = CropDb::load(&path).unwrap();
    assert_eq!(loaded, db);
    assert_eq!(loaded.capture_ids().collect::<Vec<_>>(), vec!["a", "b"]);
}

#[test]
fn test_missing_db_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("none.json");
    let db = CropDb::load_or_default(&path).unwrap();
    assert!(db.is_empty());
    assert!(CropDb::load(&path).is_err());
}

#[test]
fn test_malformed_db_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{\"a\": 3}").unwrap();
    assert!(matches!(
        CropDb::load(&path),
        Err(HyperspecError::InvalidCropDb(_))
    ));
}

#[test]
fn test_unknown_capture_message() {
    let err = CropDb::default().bounds("2023-03-09_099").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Capture ID 2023-03-09_099 not found in crops file"
    );
}

#[test]
fn test_crop_then_trim() {
    let mut data = Array3::from_elem((20, 30, 2), 0.25f32);
    // Warp fill along the left edge of the cropped region.
    for r in 0..20 {
        for c in 5..8 {
            data[[r, c, 0]] = -999.0;
        }
    }
    let cube = Cube::new(data, vec![500.0, 600.0]).unwrap();
    let cropped = cube
        .crop(&CropRect {
            x: 5,
            y: 2,
            width: 20,
            height: 16,
        })
        .unwrap();
    assert_eq!(cropped.spatial_dim(), (16, 20));

    let (trimmed, n) = trim_invalid_border(&cropped).unwrap();
    assert_eq!(n, 3);
    assert_eq!(trimmed.spatial_dim(), (10, 14));
    assert_eq!(trimmed.wavelengths, vec![500.0, 600.0]);
}

#[test]
fn test_crop_outside_cube_rejected() {
    let cube = Cube::new(Array3::zeros((10, 10, 1)), vec![]).unwrap();
    let rect = CropRect {
        x: 5,
        y: 5,
        width: 6,
        height: 2,
    };
    assert!(matches!(cube.crop(&rect), Err(HyperspecError::InvalidCrop(_))));
}
