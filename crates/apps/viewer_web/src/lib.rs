use console_error_panic_hook::set_once;
use foundation::math::Vec2;
use foundation::time::Time;
use formats::ViewerConfig;
use gloo_net::http::Request as HttpRequest;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;
use streaming::{TileLoadError, TileRequest};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};

pub mod controls;
pub mod session;
mod wgpu;

pub use controls::{DragMode, OrbitControls};
pub use session::{PointerButton, SessionError, UiEvent, ViewerSession};
use wgpu::{WgpuBackend, init_wgpu_from_canvas_id};

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

#[derive(Default)]
struct HostState {
    backend: Option<WgpuBackend>,
    session: Option<ViewerSession>,
    canvas_width: f64,
    canvas_height: f64,
    frame_callback: Option<FrameCallback>,
    raf_id: Option<i32>,
    last_error: Option<String>,
}

thread_local! {
    static STATE: RefCell<HostState> = RefCell::new(HostState {
        canvas_width: 1280.0,
        canvas_height: 720.0,
        ..HostState::default()
    });
}

fn log(msg: &str) {
    web_sys::console::log_1(&JsValue::from_str(msg));
}

fn now() -> Time {
    let ms = web_sys::window()
        .and_then(|w| w.performance())
        .map_or(0.0, |p| p.now());
    Time::from_millis(ms)
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Runs `f` against the live session and backend; a no-op before load.
fn with_session<T>(f: impl FnOnce(&mut ViewerSession, &mut WgpuBackend) -> T) -> Option<T> {
    STATE.with(|state| {
        let mut s = state.borrow_mut();
        let HostState {
            session, backend, ..
        } = &mut *s;
        match (session.as_mut(), backend.as_mut()) {
            (Some(session), Some(backend)) => Some(f(session, backend)),
            _ => None,
        }
    })
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    set_once();
    Ok(())
}

/// Sets up the GPU, loads the tree dataset and starts the render loop.
///
/// A dataset failure is fatal: the error is kept for `last_error()` and no
/// frame is ever scheduled.
#[wasm_bindgen]
pub fn init_viewer(canvas_id: String, dataset_url: String, config_json: Option<String>) {
    spawn_local(async move {
        if let Err(err) = init_viewer_inner(&canvas_id, &dataset_url, config_json.as_deref()).await
        {
            let msg = err
                .as_string()
                .unwrap_or_else(|| format!("{err:?}"));
            log(&format!("viewer init error: {msg}"));
            STATE.with(|state| state.borrow_mut().last_error = Some(msg));
        }
    });
}

async fn init_viewer_inner(
    canvas_id: &str,
    dataset_url: &str,
    config_json: Option<&str>,
) -> Result<(), JsValue> {
    let config = match config_json {
        Some(payload) => ViewerConfig::from_json_str(payload).map_err(js_err)?,
        None => ViewerConfig::default(),
    };
    let mut backend = init_wgpu_from_canvas_id(canvas_id).await?;
    let payload = fetch_text(dataset_url).await?;

    let (width, height) = STATE.with(|state| {
        let s = state.borrow();
        (s.canvas_width, s.canvas_height)
    });
    backend.resize(width as u32, height as u32);

    let seed = (js_sys::Math::random() * u64::MAX as f64) as u64;
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut session = ViewerSession::from_payload(&payload, config, &mut backend, &mut rng, now())
        .map_err(js_err)?;
    session.resize(width, height);
    let requests = session.request_tiles();

    STATE.with(|state| {
        let mut s = state.borrow_mut();
        s.backend = Some(backend);
        s.session = Some(session);
        s.last_error = None;
    });

    for request in requests {
        spawn_local(load_tile(request));
    }
    start_render_loop()
}

async fn fetch_text(url: &str) -> Result<String, JsValue> {
    let resp = HttpRequest::get(url).send().await.map_err(js_err)?;
    if !resp.ok() {
        return Err(JsValue::from_str(&format!("HTTP {} for {url}", resp.status())));
    }
    resp.text().await.map_err(js_err)
}

async fn fetch_bitmap(url: &str) -> Result<web_sys::ImageBitmap, JsValue> {
    let resp = HttpRequest::get(url).send().await.map_err(js_err)?;
    if !resp.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", resp.status())));
    }
    let bytes = resp.binary().await.map_err(js_err)?;
    let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes.as_slice()));
    let blob = web_sys::Blob::new_with_u8_array_sequence(&parts)?;
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window missing"))?;
    let bitmap = JsFuture::from(window.create_image_bitmap_with_blob(&blob)?).await?;
    bitmap.dyn_into::<web_sys::ImageBitmap>()
}

/// Fetches one ground tile. Each tile is placed on its own; a failure only
/// leaves its square empty.
async fn load_tile(request: TileRequest) {
    let result = fetch_bitmap(&request.url).await;
    with_session(|session, backend| match result {
        Ok(bitmap) => {
            if let Some(quad) = session.tile_loaded(request.request, Ok(())) {
                backend.upload_tile(
                    quad.tile,
                    &bitmap,
                    [quad.rect.center.x, quad.rect.center.z],
                    [quad.rect.width, quad.rect.depth],
                    quad.elevation,
                    quad.opacity,
                );
            }
        }
        Err(err) => {
            let reason = err.as_string().unwrap_or_else(|| format!("{err:?}"));
            session.tile_loaded(request.request, Err(TileLoadError::new(reason)));
        }
    });
}

fn start_render_loop() -> Result<(), JsValue> {
    let callback: FrameCallback = Rc::new(RefCell::new(None));
    let next = Rc::clone(&callback);
    *callback.borrow_mut() = Some(Closure::new(move |now_ms: f64| {
        let drawn = with_session(|session, backend| {
            session.tick(Time::from_millis(now_ms));
            backend.render(&session.draw_frame())
        });
        match drawn {
            Some(Ok(())) => {}
            Some(Err(err)) => log(&format!("render error: {err:?}")),
            None => return,
        }
        if let Some(cb) = next.borrow().as_ref() {
            let _ = request_frame(cb);
        }
    }));

    let first = callback
        .borrow()
        .as_ref()
        .map(request_frame)
        .transpose()?;
    STATE.with(|state| {
        let mut s = state.borrow_mut();
        s.frame_callback = Some(callback);
        s.raf_id = first;
    });
    Ok(())
}

fn request_frame(cb: &Closure<dyn FnMut(f64)>) -> Result<i32, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window missing"))?;
    let id = window.request_animation_frame(cb.as_ref().unchecked_ref())?;
    STATE.with(|state| state.borrow_mut().raf_id = Some(id));
    Ok(id)
}

/// Cancels the pending frame and releases every GPU batch.
#[wasm_bindgen]
pub fn teardown() {
    STATE.with(|state| {
        let mut s = state.borrow_mut();
        if let (Some(id), Some(window)) = (s.raf_id.take(), web_sys::window()) {
            let _ = window.cancel_animation_frame(id);
        }
        if let Some(callback) = s.frame_callback.take() {
            callback.borrow_mut().take();
        }
        let session = s.session.take();
        if let (Some(session), Some(backend)) = (session, s.backend.as_mut()) {
            session.teardown(backend);
        }
    });
}

#[wasm_bindgen]
pub fn last_error() -> Option<String> {
    STATE.with(|state| state.borrow().last_error.clone())
}

#[wasm_bindgen]
pub fn set_canvas_sizes(width: f64, height: f64) {
    STATE.with(|state| {
        let mut s = state.borrow_mut();
        s.canvas_width = width;
        s.canvas_height = height;
        if let Some(backend) = &mut s.backend {
            backend.resize(width as u32, height as u32);
        }
        if let Some(session) = &mut s.session {
            session.resize(width, height);
        }
    });
}

/// `button` is the DOM `MouseEvent.button` (0 primary, 2 secondary).
#[wasm_bindgen]
pub fn pointer_down(x_px: f64, y_px: f64, button: i16, shift: bool) {
    let button = if button == 2 {
        PointerButton::Secondary
    } else {
        PointerButton::Primary
    };
    with_session(|session, _| session.pointer_down(Vec2::new(x_px, y_px), button, shift, now()));
}

#[wasm_bindgen]
pub fn pointer_move(x_px: f64, y_px: f64) {
    with_session(|session, _| session.pointer_move(Vec2::new(x_px, y_px)));
}

#[wasm_bindgen]
pub fn pointer_up(x_px: f64, y_px: f64) -> Result<(), JsValue> {
    with_session(|session, backend| {
        session
            .pointer_up(Vec2::new(x_px, y_px), now(), backend)
            .map(|_| ())
    })
    .unwrap_or(Ok(()))
    .map_err(js_err)
}

#[wasm_bindgen]
pub fn wheel(delta_y: f64) {
    with_session(|session, _| session.wheel(delta_y));
}

/// An empty name clears the filter.
#[wasm_bindgen]
pub fn set_filter(neighborhood: &str) -> Result<usize, JsValue> {
    with_session(|session, backend| {
        session
            .apply_filter(Some(neighborhood), backend, now())
            .map(|outcome| outcome.matches)
    })
    .ok_or_else(|| js_err(SessionError::NotLoaded))?
    .map_err(js_err)
}

#[wasm_bindgen]
pub fn reset_north() {
    with_session(|session, _| session.reset_north(now()));
}

#[wasm_bindgen]
pub fn compass_heading() -> f64 {
    with_session(|session, _| session.compass_heading_deg()).unwrap_or(0.0)
}

#[wasm_bindgen]
pub fn stats_json() -> Result<String, JsValue> {
    let stats = with_session(|session, _| session.stats())
        .ok_or_else(|| js_err(SessionError::NotLoaded))?;
    serde_json::to_string(&stats).map_err(js_err)
}

#[wasm_bindgen]
pub fn neighborhoods_json() -> Result<String, JsValue> {
    let options = with_session(|session, _| session.neighborhood_options())
        .ok_or_else(|| js_err(SessionError::NotLoaded))?;
    serde_json::to_string(&options).map_err(js_err)
}

/// Screen positions for the signpost pills at the current camera.
#[wasm_bindgen]
pub fn signpost_labels_json() -> String {
    let labels = with_session(|session, _| session.signpost_labels()).unwrap_or_default();
    let rows: Vec<Value> = labels
        .iter()
        .map(|l| {
            json!({
                "text": l.text,
                "subtitle": l.subtitle,
                "x": l.screen_pos_px[0],
                "y": l.screen_pos_px[1],
            })
        })
        .collect();
    Value::Array(rows).to_string()
}

/// Drains pending UI events as a JSON array of `{ "kind": ..., ... }`.
#[wasm_bindgen]
pub fn take_ui_events() -> String {
    let events = with_session(|session, _| session.drain_events()).unwrap_or_default();
    let rows: Vec<Value> = events.into_iter().map(|e| ui_event_json(e.event)).collect();
    Value::Array(rows).to_string()
}

fn ui_event_json(event: UiEvent) -> Value {
    match event {
        UiEvent::Tooltip { text, at } => json!({ "kind": "tooltip", "text": text, "x": at.x, "y": at.y }),
        UiEvent::TooltipHidden => json!({ "kind": "tooltip_hidden" }),
        UiEvent::InfoCard(card) => json!({ "kind": "info_card", "card": card }),
        UiEvent::InfoCardHidden => json!({ "kind": "info_card_hidden" }),
        UiEvent::FilterChanged {
            neighborhood,
            matches,
        } => json!({ "kind": "filter_changed", "neighborhood": neighborhood, "matches": matches }),
        UiEvent::IntroFinished => json!({ "kind": "intro_finished" }),
    }
}
