//! Synthetic Pima-format data shared by the integration tests

#![allow(dead_code)]

use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::path::{Path, PathBuf};

/// Headerless CSV text with `n` rows in the Pima diabetes layout.
///
/// The class depends mostly on glucose and BMI, so a boosted model can
/// learn it well above chance.
pub fn pima_csv(n: usize, seed: u64) -> String {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut out = String::new();
    for _ in 0..n {
        let preg: i64 = rng.gen_range(0..15);
        let glucose: i64 = rng.gen_range(60..200);
        let bp: i64 = rng.gen_range(40..110);
        let skin: i64 = rng.gen_range(0..60);
        let insulin: i64 = rng.gen_range(0..300);
        let bmi: f64 = rng.gen_range(18.0..50.0);
        let pedigree: f64 = rng.gen_range(0.08..2.4);
        let age: i64 = rng.gen_range(21..80);
        let risk = (glucose as f64 - 120.0) / 40.0 + (bmi - 32.0) / 10.0 + rng.gen_range(-0.5..0.5);
        let class = i64::from(risk > 0.0);
        out.push_str(&format!(
            "{},{},{},{},{},{:.1},{:.3},{},{}\n",
            preg, glucose, bp, skin, insulin, bmi, pedigree, age, class
        ));
    }
    out
}

pub fn write_pima_csv(dir: &Path, name: &str, n: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, pima_csv(n, 2024)).unwrap();
    path
}
