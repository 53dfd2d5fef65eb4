use hyperspec_core::config::{NormType, RegistrationConfig, ScoreType, WtaK};
use hyperspec_core::error::HyperspecError;
use hyperspec_core::registration::RegistrationStage;
use hyperspec_core::validate::HomographyRejection;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_defaults() {
    let config = RegistrationConfig::default();
    assert_eq!(config.orb.n_features, 10_000);
    assert_eq!(config.orb.scale_factor, 1.2);
    assert_eq!(config.orb.score, ScoreType::Harris);
    assert_eq!(config.orb.wta_k, WtaK::Four);
    assert_eq!(config.matcher.norm, NormType::Hamming2);
    assert!(config.matcher.cross_check);
    assert_eq!(config.ransac.reproj_threshold, 5.0);
    assert!(config.crop_registered);
    assert_eq!(config.border_value, -999.0);
    assert_eq!(config.visual_width, 1000);
    assert!(config.validate().is_ok());
}

#[test]
fn test_wta_k_natural_norm() {
    assert_eq!(WtaK::Two.natural_norm(), NormType::Hamming);
    assert_eq!(WtaK::Three.natural_norm(), NormType::Hamming2);
    assert_eq!(WtaK::Four.natural_norm(), NormType::Hamming2);
    assert_eq!(WtaK::Three.points(), 3);
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[test]
fn test_enum_display() {
    assert_eq!(format!("{}", ScoreType::Harris), "Harris");
    assert_eq!(format!("{}", ScoreType::Fast), "FAST");
    assert_eq!(format!("{}", WtaK::Four), "WTA_K=4");
    assert_eq!(format!("{}", NormType::Hamming2), "Hamming2");
}

#[test]
fn test_stage_display() {
    assert_eq!(
        format!("{}", RegistrationStage::Detecting),
        "Detecting keypoints"
    );
    assert_eq!(format!("{}", RegistrationStage::Warping), "Warping bands");
}

#[test]
fn test_rejection_display() {
    assert_eq!(
        HomographyRejection::PerspectiveShift {
            h31: 0.002,
            h32: 0.0
        }
        .to_string(),
        "Homography results in large perspective shift (2e-3, 0e0)"
    );
}

// ---------------------------------------------------------------------------
// TOML
// ---------------------------------------------------------------------------

#[test]
fn test_toml_round_trip() {
    let mut config = RegistrationConfig::default();
    config.ransac.seed = Some(7);
    config.orb.wta_k = WtaK::Two;
    config.matcher.norm = NormType::Hamming;

    let text = toml::to_string_pretty(&config).unwrap();
    let parsed: RegistrationConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let parsed: RegistrationConfig = toml::from_str(
        r#"
        crop_registered = false

        [orb]
        n_features = 500
        score = "Fast"

        [ransac]
        seed = 3
        "#,
    )
    .unwrap();

    assert!(!parsed.crop_registered);
    assert_eq!(parsed.orb.n_features, 500);
    assert_eq!(parsed.orb.score, ScoreType::Fast);
    assert_eq!(parsed.orb.n_levels, 8);
    assert_eq!(parsed.ransac.seed, Some(3));
    assert_eq!(parsed.ransac.max_iterations, 2_000);
    assert_eq!(parsed.validation.max_perspective, 0.001);
}

#[test]
fn test_empty_toml_is_default() {
    let parsed: RegistrationConfig = toml::from_str("").unwrap();
    assert_eq!(parsed, RegistrationConfig::default());
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_validate_rejects_bad_values() {
    let cases: [fn(&mut RegistrationConfig); 7] = [
        |c| c.orb.n_features = 0,
        |c| c.orb.scale_factor = 1.0,
        |c| c.orb.patch_size = 30,
        |c| c.ransac.confidence = 1.0,
        |c| c.ransac.reproj_threshold = 0.0,
        |c| c.validation.area_tolerance = 1.5,
        |c| c.border_value = 0.0,
    ];
    for mutate in cases {
        let mut config = RegistrationConfig::default();
        mutate(&mut config);
        assert!(matches!(
            config.validate(),
            Err(HyperspecError::InvalidConfig(_))
        ));
    }
}

#[test]
fn test_validate_rejects_nan_from_toml() {
    for text in [
        "border_value = nan\n",
        "crop_registered = false\nborder_value = nan\n",
        "[ransac]\nreproj_threshold = nan\n",
        "[orb]\nfast_threshold = nan\n",
        "[validation]\nmax_perspective = nan\n",
    ] {
        let config: RegistrationConfig = toml::from_str(text).unwrap();
        assert!(
            matches!(config.validate(), Err(HyperspecError::InvalidConfig(_))),
            "accepted {text:?}"
        );
    }
}

#[test]
fn test_non_negative_border_allowed_without_crop() {
    let config = RegistrationConfig {
        crop_registered: false,
        border_value: 0.0,
        ..Default::default()
    };
    assert!(config.validate().is_ok());
}
