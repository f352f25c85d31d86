use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = Math)]
    fn random() -> f64;
}

#[cfg(target_arch = "wasm32")]
pub fn js_random() -> f64 {
    random().max(0.0).min(1.0)
}

// Math.random is unavailable when running natively, the clock stands in
#[cfg(not(target_arch = "wasm32"))]
pub fn js_random() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos) / 1_000_000_000.0
}

#[cfg(target_arch = "wasm32")]
pub fn log_status(s: &str) {
    web_sys::console::log_1(&s.trim().into());
}

// console is unavailable when running natively (cargo test)
#[cfg(not(target_arch = "wasm32"))]
pub fn log_status(s: &str) {
    let _ = s;
}

#[cfg(target_arch = "wasm32")]
pub fn alert(s: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.alert_with_message(s);
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn alert(s: &str) {
    log_status(s);
}

fn make_bytes(value: f64) -> [u8; 16] {
    let bytes = value.to_bits();

    let b1: u8 = ((bytes >> 56) & 0xff) as u8;
    let b2: u8 = ((bytes >> 48) & 0xff) as u8;
    let b3: u8 = ((bytes >> 40) & 0xff) as u8;
    let b4: u8 = ((bytes >> 32) & 0xff) as u8;
    let b5: u8 = ((bytes >> 24) & 0xff) as u8;
    let b6: u8 = ((bytes >> 16) & 0xff) as u8;
    let b7: u8 = ((bytes >> 8) & 0xff) as u8;
    let b8: u8 = (bytes & 0xff) as u8;

    [b8, b7, b6, b5, b4, b3, b2, b1, b1, b2, b3, b4, b5, b6, b7, b8]
}

/// Color generator. A fixed seed makes classification colors reproducible,
/// otherwise the generator is seeded from `Math.random()`.
pub fn color_rng(seed: Option<u64>) -> XorShiftRng {
    match seed {
        Some(s) => XorShiftRng::seed_from_u64(s),
        None => {
            let mut rng = XorShiftRng::from_seed(make_bytes(js_random()));
            // prevent duplication
            rng.gen_range(0.0..1.0);
            rng
        }
    }
}
