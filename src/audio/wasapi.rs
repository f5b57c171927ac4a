//! Windows Core Audio endpoint backend
//!
//! COM interface pointers are not `Send`, so each endpoint owns a worker
//! thread that initialises COM, activates `IAudioEndpointVolume` and serves
//! requests over a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, warn};
use windows::core::HSTRING;
use windows::Win32::Foundation::BOOL;
use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
use windows::Win32::Media::Audio::{
    eCapture, eConsole, eRender, IMMDeviceEnumerator, MMDeviceEnumerator,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_MULTITHREADED,
};

use super::{AudioBackend, AudioError};

/// Data-flow direction of the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Playback device (desktop audio)
    Render,
    /// Recording device (microphones)
    Capture,
}

enum Request {
    GetVolume(mpsc::Sender<Result<f32, AudioError>>),
    SetVolume(f32, mpsc::Sender<Result<(), AudioError>>),
    GetMute(mpsc::Sender<Result<bool, AudioError>>),
    SetMute(bool, mpsc::Sender<Result<(), AudioError>>),
    Shutdown,
}

pub struct WasapiEndpoint {
    label: String,
    requests: Mutex<mpsc::Sender<Request>>,
    disposed: AtomicBool,
}

impl WasapiEndpoint {
    /// Open `device_id` (`"default"` for the default console endpoint)
    pub fn open(device_id: &str, flow: Flow) -> Result<Self, AudioError> {
        let (req_tx, req_rx) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();
        let id = device_id.to_string();

        thread::Builder::new()
            .name(format!("wasapi-{}", device_id))
            .spawn(move || worker(id, flow, req_rx, ready_tx))
            .map_err(|e| AudioError::Platform(format!("spawn audio worker: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|_| AudioError::Platform("audio worker exited during startup".into()))??;

        Ok(Self {
            label: format!("wasapi {:?} {}", flow, device_id),
            requests: Mutex::new(req_tx),
            disposed: AtomicBool::new(false),
        })
    }

    fn call<T>(
        &self,
        build: impl FnOnce(mpsc::Sender<Result<T, AudioError>>) -> Request,
    ) -> Result<T, AudioError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(AudioError::Disposed);
        }
        let (tx, rx) = mpsc::channel();
        self.requests
            .lock()
            .send(build(tx))
            .map_err(|_| AudioError::Disposed)?;
        rx.recv().map_err(|_| AudioError::Disposed)?
    }
}

impl AudioBackend for WasapiEndpoint {
    fn name(&self) -> &str {
        &self.label
    }

    fn volume(&self) -> Result<f32, AudioError> {
        self.call(Request::GetVolume)
    }

    fn set_volume(&self, percent: f32) -> Result<(), AudioError> {
        self.call(|tx| Request::SetVolume(percent, tx))
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        self.call(Request::GetMute)
    }

    fn set_muted(&self, muted: bool) -> Result<(), AudioError> {
        self.call(|tx| Request::SetMute(muted, tx))
    }

    fn dispose(&self) -> Result<(), AudioError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.requests.lock().send(Request::Shutdown);
        Ok(())
    }
}

fn platform(context: &str, e: windows::core::Error) -> AudioError {
    AudioError::Platform(format!("{}: {}", context, e))
}

fn activate(device_id: &str, flow: Flow) -> Result<IAudioEndpointVolume, AudioError> {
    unsafe {
        let enumerator: IMMDeviceEnumerator =
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|e| platform("create device enumerator", e))?;

        let device = if device_id == "default" {
            let data_flow = match flow {
                Flow::Render => eRender,
                Flow::Capture => eCapture,
            };
            enumerator
                .GetDefaultAudioEndpoint(data_flow, eConsole)
                .map_err(|e| platform("default endpoint", e))?
        } else {
            enumerator
                .GetDevice(&HSTRING::from(device_id))
                .map_err(|_| AudioError::InvalidDeviceId(device_id.to_string()))?
        };

        device
            .Activate::<IAudioEndpointVolume>(CLSCTX_ALL, None)
            .map_err(|e| platform("activate endpoint volume", e))
    }
}

fn worker(
    device_id: String,
    flow: Flow,
    requests: mpsc::Receiver<Request>,
    ready: mpsc::Sender<Result<(), AudioError>>,
) {
    if let Err(e) = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }.ok() {
        let _ = ready.send(Err(platform("CoInitializeEx", e)));
        return;
    }

    match activate(&device_id, flow) {
        Ok(endpoint) => {
            let _ = ready.send(Ok(()));
            serve(&endpoint, requests);
            debug!("Audio worker for {} stopped", device_id);
        },
        Err(e) => {
            let _ = ready.send(Err(e));
        },
    }

    unsafe { CoUninitialize() };
}

fn serve(endpoint: &IAudioEndpointVolume, requests: mpsc::Receiver<Request>) {
    while let Ok(request) = requests.recv() {
        match request {
            Request::GetVolume(reply) => {
                let result = unsafe { endpoint.GetMasterVolumeLevelScalar() }
                    .map(|scalar| scalar * 100.0)
                    .map_err(|e| platform("get volume", e));
                let _ = reply.send(result);
            },
            Request::SetVolume(percent, reply) => {
                let scalar = (percent / 100.0).clamp(0.0, 1.0);
                let result = unsafe { endpoint.SetMasterVolumeLevelScalar(scalar, std::ptr::null()) }
                    .map_err(|e| platform("set volume", e));
                let _ = reply.send(result);
            },
            Request::GetMute(reply) => {
                let result = unsafe { endpoint.GetMute() }
                    .map(|muted| muted.as_bool())
                    .map_err(|e| platform("get mute", e));
                let _ = reply.send(result);
            },
            Request::SetMute(muted, reply) => {
                let result = unsafe { endpoint.SetMute(BOOL::from(muted), std::ptr::null()) }
                    .map_err(|e| platform("set mute", e));
                if let Err(e) = &result {
                    warn!("{}", e);
                }
                let _ = reply.send(result);
            },
            Request::Shutdown => break,
        }
    }
}
