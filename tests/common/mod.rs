//! Deterministic synthetic bank-churn data shared by the integration tests

#![allow(dead_code)]

use churn_insight::data::DataLoader;
use churn_insight::training::{
    GradientBoostingConfig, ModelBankConfig, RandomForestParams, SVMConfig,
};
use churn_insight::config::PipelineConfig;
use polars::prelude::DataFrame;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const HEADER: &str = "RowNumber,CustomerId,Surname,CreditScore,Geography,Gender,Age,Tenure,\
Balance,NumOfProducts,HasCrCard,IsActiveMember,EstimatedSalary,Exited";

const SURNAMES: [&str; 8] = [
    "Hargrave", "Hill", "Onio", "Boni", "Mitchell", "Chu", "Bartlett", "Obinna",
];

/// `n` rows with exactly `n / 5` churners, driven mostly by age, activity,
/// geography and balance
pub fn churn_csv(n: usize, seed: u64) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n);
    let mut scores = Vec::with_capacity(n);

    for i in 0..n {
        let credit_score = rng.gen_range(350..=850);
        let geography = match rng.gen_range(0..4) {
            0 | 1 => "France",
            2 => "Germany",
            _ => "Spain",
        };
        let gender = if rng.gen_bool(0.5) { "Male" } else { "Female" };
        let age = rng.gen_range(18..=80);
        let tenure = rng.gen_range(0..=10);
        let balance = if rng.gen_bool(0.35) {
            0.0
        } else {
            (rng.gen_range(50_000.0..220_000.0_f64) * 100.0).round() / 100.0
        };
        let products = rng.gen_range(1..=4);
        let has_card = rng.gen_range(0..=1);
        let active = rng.gen_range(0..=1);
        let salary = (rng.gen_range(10_000.0..200_000.0_f64) * 100.0).round() / 100.0;

        let score = 0.06 * (age as f64 - 40.0)
            + if geography == "Germany" { 0.8 } else { 0.0 }
            - 0.9 * active as f64
            + if products >= 3 { 0.6 } else { 0.0 }
            + 0.000004 * balance
            + rng.gen_range(-1.0..1.0);
        scores.push(score);

        rows.push(format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            i + 1,
            15_600_000 + i,
            SURNAMES[i % SURNAMES.len()],
            credit_score,
            geography,
            gender,
            age,
            tenure,
            balance,
            products,
            has_card,
            active,
            salary
        ));
    }

    let mut sorted = scores.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let threshold = sorted[n - n / 5];

    let mut text = String::from(HEADER);
    text.push('\n');
    for (row, score) in rows.iter().zip(&scores) {
        let exited = if *score >= threshold { 1 } else { 0 };
        text.push_str(&format!("{},{}\n", row, exited));
    }
    text
}

pub fn churn_frame(n: usize, seed: u64) -> DataFrame {
    DataLoader::default()
        .load_from_str(&churn_csv(n, seed))
        .unwrap()
}

/// Small ensembles and a short SMO budget
pub fn fast_models() -> ModelBankConfig {
    ModelBankConfig::default()
        .with_random_forest(RandomForestParams {
            n_estimators: 20,
            max_depth: Some(6),
            ..Default::default()
        })
        .with_gradient_boosting(GradientBoostingConfig {
            n_estimators: 30,
            ..Default::default()
        })
        .with_svm(SVMConfig {
            max_iter: 50,
            ..Default::default()
        })
}

pub fn fast_config() -> PipelineConfig {
    PipelineConfig::default().with_models(fast_models())
}
