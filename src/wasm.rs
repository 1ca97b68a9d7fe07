//! WebAssembly bindings for GPGPU Boids.
//!
//! `WasmFlock` drives the GPU loop on a canvas; `WasmCpuFlock` runs the CPU
//! reference flock where WebGPU/WebGL2 is not available.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::{
    compute::{BoidState, CpuFlock, SimulationStats, gpu::GpuFlock},
    schema::{Seed, SimulationConfig},
};

/// Initialize WASM module with panic hook and logging.
#[wasm_bindgen(start)]
pub fn init() {
    // Set panic hook for better error messages in browser
    console_error_panic_hook::set_once();

    wasm_logger::init(wasm_logger::Config::default());
}

fn parse_inputs(config_json: &str, seed_json: &str) -> Result<(SimulationConfig, Seed), JsValue> {
    let config: SimulationConfig = serde_json::from_str(config_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid config JSON: {e}")))?;
    config
        .validate()
        .map_err(|e| JsValue::from_str(&format!("Invalid config: {e}")))?;

    let seed: Seed = serde_json::from_str(seed_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid seed JSON: {e}")))?;

    Ok((config, seed))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
}

/// Serializable snapshot of boid state.
#[derive(Serialize)]
struct StateSnapshot<'a> {
    data: &'a [f32],
    width: usize,
    height: usize,
    time: f32,
    step: u64,
}

impl<'a> From<&'a BoidState> for StateSnapshot<'a> {
    fn from(state: &'a BoidState) -> Self {
        Self {
            data: &state.data,
            width: state.width,
            height: state.height,
            time: state.time,
            step: state.step,
        }
    }
}

// ============================================================================
// GPU Flock (canvas)
// ============================================================================

/// WebAssembly wrapper for the GPU flock presenting to a canvas.
#[wasm_bindgen]
pub struct WasmFlock {
    flock: GpuFlock,
}

#[wasm_bindgen]
impl WasmFlock {
    /// Create a GPU flock drawing to `canvas`.
    ///
    /// Async because adapter and device requests are async. Set the canvas
    /// size before calling.
    #[wasm_bindgen(constructor)]
    pub async fn new(
        canvas: web_sys::HtmlCanvasElement,
        config_json: &str,
        seed_json: &str,
    ) -> Result<WasmFlock, JsValue> {
        let (config, seed) = parse_inputs(config_json, seed_json)?;
        let flock = GpuFlock::from_canvas(canvas, config, &seed)
            .await
            .map_err(|e| JsValue::from_str(&format!("GPU initialization failed: {e}")))?;
        Ok(WasmFlock { flock })
    }

    /// Step once and draw the frame.
    #[wasm_bindgen]
    pub fn tick(&mut self) -> Result<(), JsValue> {
        self.flock
            .tick()
            .map_err(|e| JsValue::from_str(&format!("Frame failed: {e}")))
    }

    /// Run multiple frames.
    #[wasm_bindgen]
    pub fn run(&mut self, frames: u64) -> Result<(), JsValue> {
        self.flock
            .run(frames)
            .map_err(|e| JsValue::from_str(&format!("Frame failed: {e}")))
    }

    /// Reset the flock with a new seed.
    #[wasm_bindgen]
    pub fn reset(&mut self, seed_json: &str) -> Result<(), JsValue> {
        let seed: Seed = serde_json::from_str(seed_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid seed JSON: {e}")))?;
        let state = BoidState::from_seed(&seed, self.flock.config());
        self.flock
            .upload_state(&state)
            .map_err(|e| JsValue::from_str(&format!("Reset failed: {e}")))
    }

    /// Read the state back and summarize it.
    #[wasm_bindgen(js_name = getStats)]
    pub async fn get_stats(&self) -> Result<JsValue, JsValue> {
        let state = self
            .flock
            .read_state_async()
            .await
            .map_err(|e| JsValue::from_str(&format!("Readback failed: {e}")))?;
        to_js(&SimulationStats::from_state(&state))
    }

    /// Read the state back as a snapshot.
    #[wasm_bindgen(js_name = getState)]
    pub async fn get_state(&self) -> Result<JsValue, JsValue> {
        let state = self
            .flock
            .read_state_async()
            .await
            .map_err(|e| JsValue::from_str(&format!("Readback failed: {e}")))?;
        to_js(&StateSnapshot::from(&state))
    }

    #[wasm_bindgen(js_name = getTime)]
    pub fn get_time(&self) -> f32 {
        self.flock.time()
    }

    #[wasm_bindgen(js_name = getStep)]
    pub fn get_step(&self) -> u64 {
        self.flock.step_count()
    }
}

// ============================================================================
// CPU Flock
// ============================================================================

/// WebAssembly wrapper for the CPU reference flock.
#[wasm_bindgen]
pub struct WasmCpuFlock {
    flock: CpuFlock,
    state: BoidState,
}

#[wasm_bindgen]
impl WasmCpuFlock {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, seed_json: &str) -> Result<WasmCpuFlock, JsValue> {
        let (config, seed) = parse_inputs(config_json, seed_json)?;
        let state = BoidState::from_seed(&seed, &config);
        let flock =
            CpuFlock::new(config).map_err(|e| JsValue::from_str(&format!("Invalid config: {e}")))?;
        Ok(WasmCpuFlock { flock, state })
    }

    #[wasm_bindgen]
    pub fn step(&mut self) {
        self.flock.step(&mut self.state);
    }

    #[wasm_bindgen]
    pub fn run(&mut self, steps: u64) {
        self.flock.run(&mut self.state, steps);
    }

    #[wasm_bindgen]
    pub fn reset(&mut self, seed_json: &str) -> Result<(), JsValue> {
        let seed: Seed = serde_json::from_str(seed_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid seed JSON: {e}")))?;
        self.state = BoidState::from_seed(&seed, self.flock.config());
        Ok(())
    }

    /// Positions and velocities as a flat `Float32Array` (RGBA per boid).
    #[wasm_bindgen(js_name = getData)]
    pub fn get_data(&self) -> js_sys::Float32Array {
        js_sys::Float32Array::from(self.state.data.as_slice())
    }

    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> Result<JsValue, JsValue> {
        to_js(&StateSnapshot::from(&self.state))
    }

    #[wasm_bindgen(js_name = getStats)]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        to_js(&SimulationStats::from_state(&self.state))
    }

    #[wasm_bindgen(js_name = getTime)]
    pub fn get_time(&self) -> f32 {
        self.state.time
    }

    #[wasm_bindgen(js_name = getStep)]
    pub fn get_step(&self) -> u64 {
        self.state.step
    }

    #[wasm_bindgen(js_name = getWidth)]
    pub fn get_width(&self) -> usize {
        self.state.width
    }

    #[wasm_bindgen(js_name = getHeight)]
    pub fn get_height(&self) -> usize {
        self.state.height
    }
}
