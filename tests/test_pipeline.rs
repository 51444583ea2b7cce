//! Integration test: full pipeline (train → save → load → predict)

use habitus::artifacts::ArtifactBundle;
use habitus::error::HabitusError;
use habitus::inference::Predictor;
use habitus::schema::{ObesityClass, SurveyRecord, TARGET_COLUMN};
use habitus::training::{compare_models, ModelType, TrainEngine, TrainingConfig};
use polars::prelude::*;

/// Deterministic survey record whose BMI lands inside the band of `class`.
fn survey_record(i: usize, class: ObesityClass) -> SurveyRecord {
    let heights = [1.55, 1.62, 1.68, 1.75, 1.82, 1.88];
    let height = heights[i % heights.len()];
    let bmi = match class {
        ObesityClass::InsufficientWeight => 16.5 + 0.2 * (i % 4) as f64,
        ObesityClass::NormalWeight => 21.0 + 0.4 * (i % 4) as f64,
        ObesityClass::OverweightLevelI => 25.5 + 0.3 * (i % 4) as f64,
        ObesityClass::OverweightLevelII => 28.0 + 0.4 * (i % 4) as f64,
        ObesityClass::ObesityTypeI => 30.5 + 0.9 * (i % 4) as f64,
        ObesityClass::ObesityTypeII => 35.5 + 0.9 * (i % 4) as f64,
        ObesityClass::ObesityTypeIII => 40.5 + 1.2 * (i % 4) as f64,
    };

    SurveyRecord {
        gender: if i % 2 == 0 { "Male" } else { "Female" }.to_string(),
        age: 18.0 + ((i * 7) % 40) as f64,
        height,
        weight: bmi * height * height,
        family_history: if i % 2 == 0 { "yes" } else { "no" }.to_string(),
        favc: if i % 3 == 0 { "yes" } else { "no" }.to_string(),
        fcvc: 1.0 + (i % 3) as f64,
        ncp: 1.0 + (i % 4) as f64,
        caec: ["no", "Sometimes", "Frequently", "Always"][i % 4].to_string(),
        smoke: if i % 4 == 0 { "yes" } else { "no" }.to_string(),
        ch2o: 1.0 + (i % 3) as f64,
        scc: if i % 5 == 0 { "yes" } else { "no" }.to_string(),
        faf: (i % 4) as f64,
        tue: (i % 3) as f64,
        calc: ["no", "Sometimes", "Frequently"][i % 3].to_string(),
        mtrans: ["Public_Transportation", "Automobile", "Walking", "Motorbike", "Bike"][i % 5]
            .to_string(),
    }
}

fn survey_dataset(per_class: usize) -> (Vec<SurveyRecord>, Vec<ObesityClass>) {
    let mut records = Vec::new();
    let mut classes = Vec::new();
    for (c, &class) in ObesityClass::CANONICAL_ORDER.iter().enumerate() {
        for i in 0..per_class {
            records.push(survey_record(c * per_class + i, class));
            classes.push(class);
        }
    }
    (records, classes)
}

fn training_frame(per_class: usize) -> DataFrame {
    let (records, classes) = survey_dataset(per_class);
    let mut df = SurveyRecord::to_dataframe(&records).unwrap();
    let labels: Vec<&str> = classes.iter().map(|c| c.as_label()).collect();
    df.with_column(Series::new(TARGET_COLUMN.into(), labels)).unwrap();
    df
}

fn fitted_engine() -> TrainEngine {
    let config = TrainingConfig::default().with_n_estimators(25);
    let mut engine = TrainEngine::new(config);
    engine.fit(&training_frame(8)).unwrap();
    engine
}

#[test]
fn test_train_save_load_predict() {
    let engine = fitted_engine();
    let bundle = engine.into_bundle().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("bundle.json");
    bundle.save(&path).unwrap();

    let predictor = Predictor::load(&path).unwrap();
    let prediction = predictor
        .predict(&survey_record(3, ObesityClass::ObesityTypeII))
        .unwrap();

    assert_eq!(prediction.probabilities.len(), 7);
    assert!(prediction.confidence > 0.0);
    assert!(prediction.bmi > 30.0);
}

#[test]
fn test_reloaded_bundle_reproduces_probabilities() {
    let engine = fitted_engine();
    let bundle = engine.into_bundle().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.json");
    bundle.save(&path).unwrap();
    let reloaded = ArtifactBundle::load(&path).unwrap();

    let (records, _) = survey_dataset(2);
    let x_a = bundle.preparer().prepare_records(&records).unwrap();
    let x_b = reloaded.preparer().prepare_records(&records).unwrap();
    let proba_a = bundle.model.predict_proba(&x_a).unwrap();
    let proba_b = reloaded.model.predict_proba(&x_b).unwrap();

    assert_eq!(proba_a.dim(), proba_b.dim());
    for (a, b) in proba_a.iter().zip(proba_b.iter()) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn test_predictions_recover_training_labels() {
    let engine = fitted_engine();
    let predictor = Predictor::new(engine.into_bundle().unwrap()).unwrap();

    let (records, classes) = survey_dataset(8);
    let predictions = predictor.predict_batch(&records).unwrap();

    let correct = predictions
        .iter()
        .zip(&classes)
        .filter(|(p, c)| p.class == **c)
        .count();
    let accuracy = correct as f64 / records.len() as f64;
    assert!(accuracy >= 0.9, "in-sample accuracy was {}", accuracy);
}

#[test]
fn test_probabilities_are_severity_ordered_and_sum_to_one() {
    let engine = fitted_engine();
    let predictor = Predictor::new(engine.into_bundle().unwrap()).unwrap();

    let (records, _) = survey_dataset(1);
    for prediction in predictor.predict_batch(&records).unwrap() {
        let order: Vec<ObesityClass> =
            prediction.probabilities.iter().map(|(c, _)| *c).collect();
        assert_eq!(order, ObesityClass::CANONICAL_ORDER.to_vec());

        let sum: f64 = prediction.probabilities.iter().map(|(_, p)| p).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_repeated_calls_are_deterministic() {
    let engine = fitted_engine();
    let predictor = Predictor::new(engine.into_bundle().unwrap()).unwrap();
    let record = survey_record(5, ObesityClass::OverweightLevelII);

    let first = predictor.predict(&record).unwrap();
    for _ in 0..3 {
        let again = predictor.predict(&record).unwrap();
        assert_eq!(again.class, first.class);
        for ((_, a), (_, b)) in again.probabilities.iter().zip(&first.probabilities) {
            assert_eq!(a, b);
        }
    }
}

#[test]
fn test_reference_record_end_to_end() {
    let engine = fitted_engine();
    let predictor = Predictor::new(engine.into_bundle().unwrap()).unwrap();

    // Male, 30 years, 1.75 m, 80 kg: BMI 26.122, the usual smoke-test input
    let record = SurveyRecord {
        gender: "Male".to_string(),
        age: 30.0,
        height: 1.75,
        weight: 80.0,
        family_history: "yes".to_string(),
        favc: "yes".to_string(),
        fcvc: 2.0,
        ncp: 3.0,
        caec: "Sometimes".to_string(),
        smoke: "no".to_string(),
        ch2o: 2.0,
        scc: "no".to_string(),
        faf: 1.0,
        tue: 1.0,
        calc: "Sometimes".to_string(),
        mtrans: "Public_Transportation".to_string(),
    };

    let prediction = predictor.predict(&record).unwrap();
    assert_eq!(prediction.probabilities.len(), 7);
    let sum: f64 = prediction.probabilities.iter().map(|(_, p)| p).sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert!((prediction.bmi - 26.122).abs() < 1e-3);
    assert!(ObesityClass::CANONICAL_ORDER.contains(&prediction.class));
}

#[test]
fn test_tampered_bundle_is_rejected() {
    let engine = fitted_engine();
    let bundle = engine.into_bundle().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.json");
    bundle.save(&path).unwrap();

    // Drop one feature from the stored order; the model width no longer
    // matches and the load must refuse to produce a usable predictor
    let raw = std::fs::read_to_string(&path).unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    value["feature_order"].as_array_mut().unwrap().pop();
    std::fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();

    let err = ArtifactBundle::load(&path).unwrap_err();
    assert!(matches!(err, HabitusError::ArtifactMismatch(_)));
}

#[test]
fn test_unknown_transport_rejected_end_to_end() {
    let engine = fitted_engine();
    let predictor = Predictor::new(engine.into_bundle().unwrap()).unwrap();

    let mut record = survey_record(0, ObesityClass::NormalWeight);
    record.mtrans = "Teleport".to_string();

    let err = predictor.predict(&record).unwrap_err();
    assert!(matches!(err, HabitusError::UnknownCategory { .. }));
}

#[test]
fn test_non_positive_height_fails_fast() {
    let engine = fitted_engine();
    let predictor = Predictor::new(engine.into_bundle().unwrap()).unwrap();

    let mut record = survey_record(0, ObesityClass::NormalWeight);
    record.height = 0.0;

    match predictor.predict(&record).unwrap_err() {
        HabitusError::Range { field, .. } => assert_eq!(field, "Height"),
        other => panic!("expected Range, got {:?}", other),
    }
}

#[test]
fn test_cross_validation_end_to_end() {
    let config = TrainingConfig::default()
        .with_model(ModelType::DecisionTree)
        .with_cv(3);
    let mut engine = TrainEngine::new(config);
    engine.fit(&training_frame(8)).unwrap();

    let cv = engine.cv().unwrap();
    assert_eq!(cv.n_folds, 3);
    assert_eq!(cv.scores.len(), 3);
    assert!((0.0..=1.0).contains(&cv.mean));
}

#[test]
fn test_model_comparison_ranks_models() {
    let base = TrainingConfig::default().with_n_estimators(15);
    let rows = compare_models(&training_frame(8), &base).unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows[0].accuracy >= rows[1].accuracy);
    for row in &rows {
        assert!((0.0..=1.0).contains(&row.accuracy));
        assert!((0.0..=1.0).contains(&row.f1_weighted));
    }
}

#[test]
fn test_recommendations_follow_the_record() {
    let engine = fitted_engine();
    let predictor = Predictor::new(engine.into_bundle().unwrap()).unwrap();

    // survey_record(0, _): favc = "yes", faf = 0
    let record = survey_record(0, ObesityClass::OverweightLevelI);
    let prediction = predictor.predict(&record).unwrap();
    let advice = predictor.explain(&record, &prediction);

    assert!(!advice.is_empty());
    assert!(advice.iter().any(|a| a.contains("walks")));
    assert!(advice.iter().any(|a| a.contains("high-caloric")));
}

#[test]
fn test_csv_round_trip_trains() {
    let mut df = training_frame(4);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("survey.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();

    let loaded = habitus::cli::load_data(&path).unwrap();
    assert_eq!(loaded.height(), 28);

    let config = TrainingConfig::default().with_model(ModelType::DecisionTree);
    let mut engine = TrainEngine::new(config);
    engine.fit(&loaded).unwrap();
    assert!(engine.is_fitted());
}
