//! System clipboard reader backed by `arboard`.

use partner_core::{ClipboardError, ClipboardSource};

/// Opens the platform clipboard lazily and reopens it after a failure.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Result<&mut arboard::Clipboard, ClipboardError> {
        if self.handle.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|err| ClipboardError::Unavailable(err.to_string()))?;
            self.handle = Some(clipboard);
        }
        self.handle
            .as_mut()
            .ok_or_else(|| ClipboardError::Unavailable("clipboard not initialised".to_string()))
    }
}

impl ClipboardSource for SystemClipboard {
    fn read_text(&mut self) -> Result<String, ClipboardError> {
        let result = self.handle()?.get_text();
        match result {
            Ok(text) => Ok(text),
            // No text on the clipboard reads as empty.
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(arboard::Error::ConversionFailure) => Err(ClipboardError::NotText),
            Err(err) => {
                self.handle = None;
                Err(ClipboardError::Unavailable(err.to_string()))
            }
        }
    }
}
