//! Session state machine
//!
//! Tracks the shared session from the first client to the last one.
//!
//! ```text
//!            first client              pipeline ready
//!   Idle ─────────────────► Configuring ─────────────► Active ──┐
//!    ▲                           │                       │      │ clients come
//!    │        last client        │      last client      │ ◄────┘ and go
//!    └───────────────────────────┴───────────────────────┘
//! ```
//!
//! The element slots exist only between the first client and the last
//! one, and are bound at most once in between.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::pipeline::{Element, Pipeline};
use crate::quality::QualityState;
use crate::session::config::SessionConfig;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No clients, nothing bound
    Idle,
    /// Clients attached, waiting for the pipeline to be ready
    Configuring,
    /// Elements bound, streaming
    Active,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Configuring => "configuring",
            SessionPhase::Active => "active",
        };
        f.write_str(name)
    }
}

/// Handles to the pipeline and the elements the session drives
///
/// An element missing from the pipeline leaves its slot empty.
#[derive(Default)]
pub struct ElementSlots {
    pub pipeline: Option<Arc<dyn Pipeline>>,
    pub source: Option<Arc<dyn Element>>,
    pub encoder: Option<Arc<dyn Element>>,
    pub payloader: Option<Arc<dyn Element>>,
}

impl ElementSlots {
    /// Whether the pipeline has been bound
    pub fn is_bound(&self) -> bool {
        self.pipeline.is_some()
    }
}

impl fmt::Debug for ElementSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn name(slot: &Option<Arc<dyn Element>>) -> Option<&str> {
            slot.as_ref().map(|element| element.name())
        }

        f.debug_struct("ElementSlots")
            .field("pipeline", &self.pipeline.is_some())
            .field("source", &name(&self.source))
            .field("encoder", &name(&self.encoder))
            .field("payloader", &name(&self.payloader))
            .finish()
    }
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Attached clients
    pub clients: u32,

    /// Current phase
    pub phase: SessionPhase,

    /// Current quality values
    pub quality: QualityState,

    /// Allocated on the first client, released on the last
    elements: Option<ElementSlots>,

    /// When the current session started
    pub connected_at: Option<Instant>,

    /// Idle to Configuring transitions so far
    pub cycles: u64,
}

impl SessionState {
    /// Create an idle session
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            clients: 0,
            phase: SessionPhase::Idle,
            quality: QualityState::initial(config),
            elements: None,
            connected_at: None,
            cycles: 0,
        }
    }

    /// True iff at least one client is attached
    pub fn is_connected(&self) -> bool {
        self.clients > 0
    }

    /// Count a new client and return the new total
    ///
    /// The first client allocates the element slots and moves the session
    /// to `Configuring`.
    pub fn attach_client(&mut self) -> u32 {
        self.clients += 1;

        if self.clients == 1 {
            self.phase = SessionPhase::Configuring;
            self.elements = Some(ElementSlots::default());
            self.connected_at = Some(Instant::now());
            self.cycles += 1;
        }

        self.clients
    }

    /// Remove a client and return the new total
    ///
    /// Returns `None` when no client was attached. Releasing the slots on
    /// the last client is left to [`release`](Self::release).
    pub fn detach_client(&mut self) -> Option<u32> {
        self.clients = self.clients.checked_sub(1)?;
        Some(self.clients)
    }

    /// Bind the pipeline and element handles
    ///
    /// Only valid while `Configuring`; returns false otherwise and leaves
    /// the state untouched.
    pub fn bind(&mut self, slots: ElementSlots) -> bool {
        if self.phase != SessionPhase::Configuring {
            return false;
        }

        match self.elements.as_mut() {
            Some(current) if !current.is_bound() => {
                *current = slots;
                self.phase = SessionPhase::Active;
                true
            }
            _ => false,
        }
    }

    /// Return to `Idle`, handing back whatever was bound
    ///
    /// Returns `None` if the session was already idle.
    pub fn release(&mut self) -> Option<ElementSlots> {
        self.phase = SessionPhase::Idle;
        self.connected_at = None;
        self.elements.take()
    }

    /// Element slots, present between the first and last client
    pub fn elements(&self) -> Option<&ElementSlots> {
        self.elements.as_ref()
    }

    /// Bound pipeline, if any
    pub fn pipeline(&self) -> Option<&Arc<dyn Pipeline>> {
        self.elements.as_ref()?.pipeline.as_ref()
    }

    /// Bound encoder, if any
    pub fn encoder(&self) -> Option<&Arc<dyn Element>> {
        self.elements.as_ref()?.encoder.as_ref()
    }

    /// Bound payloader, if any
    pub fn payloader(&self) -> Option<&Arc<dyn Element>> {
        self.elements.as_ref()?.payloader.as_ref()
    }

    /// Time since the first client of the current session
    pub fn uptime(&self) -> Option<Duration> {
        self.connected_at.map(|t| t.elapsed())
    }
}
