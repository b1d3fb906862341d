// src/messages.rs
//
// Status texts sent to clients, in the configured language.

use crate::types::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMessage {
    Connected,
    CameraStarting,
    CameraStarted,
    CameraStopped,
    CaptureStarted,
    CaptureStopped,
    CaptureReset,
    NoModel,
}

impl StatusMessage {
    pub fn text(self, language: Language) -> &'static str {
        match language {
            Language::PtBr => match self {
                Self::Connected => "Conectado ao servidor",
                Self::CameraStarting => "Iniciando câmera...",
                Self::CameraStarted => "Câmera iniciada com sucesso!",
                Self::CameraStopped => "Câmera parada",
                Self::CaptureStarted => "Captura iniciada",
                Self::CaptureStopped => "Captura parada",
                Self::CaptureReset => "Captura reiniciada",
                Self::NoModel => "Modelo não carregado. Treine o modelo primeiro.",
            },
            Language::En => match self {
                Self::Connected => "Connected to server",
                Self::CameraStarting => "Starting camera...",
                Self::CameraStarted => "Camera started successfully!",
                Self::CameraStopped => "Camera stopped",
                Self::CaptureStarted => "Capture started",
                Self::CaptureStopped => "Capture stopped",
                Self::CaptureReset => "Capture reset",
                Self::NoModel => "Model not loaded. Train the model first.",
            },
        }
    }
}
