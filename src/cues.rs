// src/cues.rs
//! Sound cue player. Silent on every failure path.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Typing,
    Item,
    Error,
    Success,
}

impl Cue {
    pub const ALL: [Cue; 4] = [Cue::Typing, Cue::Item, Cue::Error, Cue::Success];

    pub fn name(self) -> &'static str {
        match self {
            Cue::Typing => "typing",
            Cue::Item => "item",
            Cue::Error => "error",
            Cue::Success => "success",
        }
    }
}

/// A loaded platform audio clip.
pub trait AudioClip: Send + Sync {
    fn set_volume(&self, volume: f32);
    fn rewind(&self);
    fn pause(&self);
    /// Rejection (autoplay policy, overlapping play) is reported, never panics.
    fn play(&self) -> anyhow::Result<()>;
}

pub trait ClipLoader {
    fn load(&self, cue: Cue) -> anyhow::Result<Arc<dyn AudioClip>>;
}

pub struct SoundCuePlayer {
    clips: HashMap<Cue, Arc<dyn AudioClip>>,
    volume: f32,
    // Written once by a successful unlock, read-only afterwards.
    enabled: OnceCell<()>,
}

impl SoundCuePlayer {
    /// Load the fixed cue set; clips that fail to load are simply missing.
    pub fn load(loader: &dyn ClipLoader, volume: f32) -> Self {
        let mut clips = HashMap::new();
        for cue in Cue::ALL {
            match loader.load(cue) {
                Ok(clip) => {
                    clip.set_volume(volume);
                    clips.insert(cue, clip);
                }
                Err(e) => debug!(target: "cues", cue = cue.name(), error = %e, "clip unavailable"),
            }
        }
        Self {
            clips,
            volume,
            enabled: OnceCell::new(),
        }
    }

    /// Player with no clips; `play` is always a no-op.
    pub fn silent() -> Self {
        Self {
            clips: HashMap::new(),
            volume: 0.0,
            enabled: OnceCell::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get().is_some()
    }

    /// Call synchronously from a trusted gesture (click / key press).
    /// Plays one clip muted, then restores it. Idempotent.
    pub fn unlock(&self) -> bool {
        if self.is_enabled() {
            return true;
        }
        let Some(clip) = Cue::ALL.iter().find_map(|c| self.clips.get(c)) else {
            return false;
        };
        clip.set_volume(0.0);
        let res = clip.play();
        clip.pause();
        clip.rewind();
        clip.set_volume(self.volume);
        match res {
            Ok(()) => {
                let _ = self.enabled.set(());
                debug!(target: "cues", "audio unlocked");
                true
            }
            Err(e) => {
                debug!(target: "cues", error = %e, "audio unlock refused; staying silent");
                false
            }
        }
    }

    pub fn play(&self, cue: Cue) {
        if !self.is_enabled() {
            return;
        }
        let Some(clip) = self.clips.get(&cue) else {
            return;
        };
        clip.rewind();
        if let Err(e) = clip.play() {
            trace!(target: "cues", cue = cue.name(), error = %e, "play rejected");
        }
    }
}

/// Clip that plays nothing; used where no audio device exists.
#[derive(Debug, Default)]
pub struct SilentClip;

impl AudioClip for SilentClip {
    fn set_volume(&self, _volume: f32) {}
    fn rewind(&self) {}
    fn pause(&self) {}
    fn play(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SilentLoader;

impl ClipLoader for SilentLoader {
    fn load(&self, _cue: Cue) -> anyhow::Result<Arc<dyn AudioClip>> {
        Ok(Arc::new(SilentClip))
    }
}
