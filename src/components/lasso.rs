use std::time::{Duration, Instant};

use eframe::egui::{Color32, Pos2};

use crate::ops::preview::LassoPreview;
use crate::timer::Timer;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LassoConfig {
    pub min_vertices: usize,
    /// A click this close to the previous vertex is dropped.
    pub dedupe_radius: f32,
    /// A click this close to vertex 0 closes the polygon (once closable).
    pub close_radius: f32,
    /// Quiet time after which a closable polygon completes by itself.
    pub idle_timeout: Duration,
}

impl Default for LassoConfig {
    fn default() -> Self {
        Self {
            min_vertices: 3,
            dedupe_radius: 10.0,
            close_radius: 10.0,
            idle_timeout: Duration::from_millis(2800),
        }
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// What a click did to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LassoClick {
    /// A new session with one vertex.
    Started,
    /// Too close to the previous vertex.
    Ignored,
    Appended { count: usize },
    /// Landed on vertex 0 of a closable polygon; the caller completes it.
    CloseRequested,
}

/// Why the polygon cannot be completed yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LassoRejection {
    NotActive,
    TooFewVertices { required: usize, have: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LassoPop {
    Removed { remaining: usize },
    /// The last vertex went; the session is over.
    Ended,
    NotActive,
}

// ============================================================================
// SESSION
// ============================================================================

/// Click-to-add polygon builder with an idle auto-complete timer.
#[derive(Debug)]
pub struct LassoSession {
    config: LassoConfig,
    vertices: Vec<Pos2>,
    active: bool,
    idle: Timer,
    last_interaction: Option<Instant>,
    cursor: Option<Pos2>,
}

impl LassoSession {
    pub fn new(config: LassoConfig) -> Self {
        Self {
            config,
            vertices: Vec::new(),
            active: false,
            idle: Timer::default(),
            last_interaction: None,
            cursor: None,
        }
    }

    pub fn config(&self) -> LassoConfig {
        self.config
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn vertices(&self) -> &[Pos2] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn is_closable(&self) -> bool {
        self.active && self.vertices.len() >= self.config.min_vertices
    }

    pub fn last_interaction(&self) -> Option<Instant> {
        self.last_interaction
    }

    pub fn idle_deadline(&self) -> Option<Instant> {
        self.idle.deadline()
    }

    pub fn cursor(&self) -> Option<Pos2> {
        self.cursor
    }

    /// Pointer position for the live crosshair. Never becomes a vertex.
    pub fn set_cursor(&mut self, cursor: Option<Pos2>) {
        self.cursor = cursor;
    }

    pub fn click(&mut self, pos: Pos2, now: Instant) -> LassoClick {
        if !self.active {
            self.idle.cancel();
            self.vertices.clear();
            self.vertices.push(pos);
            self.active = true;
            self.last_interaction = Some(now);
            crate::log_info!("lasso: started at ({:.1}, {:.1})", pos.x, pos.y);
            return LassoClick::Started;
        }

        if let Some(last) = self.vertices.last()
            && last.distance(pos) < self.config.dedupe_radius
        {
            return LassoClick::Ignored;
        }

        self.last_interaction = Some(now);
        if self.is_closable()
            && let Some(first) = self.vertices.first()
            && first.distance(pos) < self.config.close_radius
        {
            return LassoClick::CloseRequested;
        }

        self.vertices.push(pos);
        let count = self.vertices.len();
        if count >= self.config.min_vertices {
            self.idle.arm(now + self.config.idle_timeout);
        }
        LassoClick::Appended { count }
    }

    /// Check whether the polygon may be completed now.
    pub fn ready(&self) -> Result<(), LassoRejection> {
        if !self.active {
            return Err(LassoRejection::NotActive);
        }
        if self.vertices.len() < self.config.min_vertices {
            return Err(LassoRejection::TooFewVertices {
                required: self.config.min_vertices,
                have: self.vertices.len(),
            });
        }
        Ok(())
    }

    /// End the session and hand out the polygon, if it is complete.
    pub fn take_polygon(&mut self) -> Result<Vec<Pos2>, LassoRejection> {
        self.ready()?;
        let polygon = std::mem::take(&mut self.vertices);
        self.reset();
        crate::log_info!("lasso: completed with {} vertices", polygon.len());
        Ok(polygon)
    }

    /// Drop the session. Returns whether one was active.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.active;
        self.vertices.clear();
        self.reset();
        if was_active {
            crate::log_info!("lasso: cancelled");
        }
        was_active
    }

    pub fn pop_vertex(&mut self, now: Instant) -> LassoPop {
        if !self.active {
            return LassoPop::NotActive;
        }
        self.vertices.pop();
        self.last_interaction = Some(now);
        if self.vertices.is_empty() {
            self.reset();
            return LassoPop::Ended;
        }
        if self.vertices.len() < self.config.min_vertices {
            self.idle.cancel();
        }
        LassoPop::Removed { remaining: self.vertices.len() }
    }

    /// True once when the idle timer fires on a still-closable session.
    pub fn poll_idle(&mut self, now: Instant) -> bool {
        self.idle.poll(now) && self.is_closable()
    }

    pub fn preview(&self, color: Color32) -> LassoPreview<'_> {
        LassoPreview {
            vertices: &self.vertices,
            cursor: self.cursor,
            color,
            min_vertices: self.config.min_vertices,
        }
    }

    fn reset(&mut self) {
        self.idle.cancel();
        self.active = false;
        self.cursor = None;
        self.last_interaction = None;
    }
}

/// Localized name for a completed polygon.
pub fn shape_name(vertex_count: usize) -> String {
    match vertex_count {
        3 => t!("lasso.shape.triangle"),
        4 => t!("lasso.shape.quadrilateral"),
        n => t!("lasso.shape.polygon", count = n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{Clock, ManualClock};

    fn session() -> (LassoSession, ManualClock) {
        (LassoSession::new(LassoConfig::default()), ManualClock::new())
    }

    #[test]
    fn first_click_starts_and_near_duplicates_are_ignored() {
        let (mut lasso, clock) = session();
        assert_eq!(lasso.click(Pos2::new(10.0, 10.0), clock.now()), LassoClick::Started);
        assert_eq!(lasso.click(Pos2::new(15.0, 10.0), clock.now()), LassoClick::Ignored);
        assert_eq!(lasso.click(Pos2::new(50.0, 10.0), clock.now()), LassoClick::Appended { count: 2 });
        assert_eq!(lasso.len(), 2);
    }

    #[test]
    fn clicking_vertex_zero_with_two_vertices_appends() {
        let (mut lasso, clock) = session();
        lasso.click(Pos2::new(0.0, 0.0), clock.now());
        lasso.click(Pos2::new(100.0, 0.0), clock.now());
        let outcome = lasso.click(Pos2::new(5.0, 0.0), clock.now());
        assert_eq!(outcome, LassoClick::Appended { count: 3 });
        assert!(lasso.is_active());
    }

    #[test]
    fn clicking_vertex_zero_when_closable_requests_close() {
        let (mut lasso, clock) = session();
        for p in [Pos2::new(0.0, 0.0), Pos2::new(100.0, 0.0), Pos2::new(0.0, 100.0)] {
            lasso.click(p, clock.now());
        }
        assert_eq!(lasso.click(Pos2::new(3.0, 4.0), clock.now()), LassoClick::CloseRequested);
        let poly = lasso.take_polygon().unwrap();
        assert_eq!(poly.len(), 3);
        assert!(!lasso.is_active());
        assert_eq!(lasso.idle_deadline(), None);
    }

    #[test]
    fn completion_below_threshold_is_rejected() {
        let (mut lasso, clock) = session();
        assert_eq!(lasso.ready(), Err(LassoRejection::NotActive));
        lasso.click(Pos2::new(0.0, 0.0), clock.now());
        lasso.click(Pos2::new(50.0, 0.0), clock.now());
        assert_eq!(
            lasso.take_polygon(),
            Err(LassoRejection::TooFewVertices { required: 3, have: 2 })
        );
        assert!(lasso.is_active());
    }

    #[test]
    fn idle_timer_fires_after_the_last_append() {
        let (mut lasso, clock) = session();
        lasso.click(Pos2::new(0.0, 0.0), clock.now());
        lasso.click(Pos2::new(50.0, 0.0), clock.now());
        assert_eq!(lasso.idle_deadline(), None);
        lasso.click(Pos2::new(0.0, 50.0), clock.now());
        clock.advance(Duration::from_millis(2000));
        lasso.click(Pos2::new(50.0, 50.0), clock.now());
        clock.advance(Duration::from_millis(2000));
        assert!(!lasso.poll_idle(clock.now()));
        clock.advance(Duration::from_millis(800));
        assert!(lasso.poll_idle(clock.now()));
        assert!(!lasso.poll_idle(clock.now()));
    }

    #[test]
    fn backspace_below_threshold_disarms_and_empty_ends() {
        let (mut lasso, clock) = session();
        for p in [Pos2::new(0.0, 0.0), Pos2::new(100.0, 0.0), Pos2::new(0.0, 100.0)] {
            lasso.click(p, clock.now());
        }
        assert!(lasso.idle_deadline().is_some());
        assert_eq!(lasso.pop_vertex(clock.now()), LassoPop::Removed { remaining: 2 });
        assert_eq!(lasso.idle_deadline(), None);
        clock.advance(Duration::from_secs(5));
        assert!(!lasso.poll_idle(clock.now()));
        assert_eq!(lasso.pop_vertex(clock.now()), LassoPop::Removed { remaining: 1 });
        assert!(lasso.is_active());
        assert_eq!(lasso.pop_vertex(clock.now()), LassoPop::Ended);
        assert!(!lasso.is_active());
        assert_eq!(lasso.pop_vertex(clock.now()), LassoPop::NotActive);
    }

    #[test]
    fn cancel_discards_everything() {
        let (mut lasso, clock) = session();
        lasso.click(Pos2::new(0.0, 0.0), clock.now());
        lasso.set_cursor(Some(Pos2::new(30.0, 30.0)));
        assert!(lasso.cancel());
        assert!(lasso.is_empty());
        assert_eq!(lasso.cursor(), None);
        assert!(!lasso.cancel());
    }

    #[test]
    fn thresholds_are_independent() {
        let config = LassoConfig { dedupe_radius: 2.0, close_radius: 30.0, ..LassoConfig::default() };
        let mut lasso = LassoSession::new(config);
        let clock = ManualClock::new();
        for p in [Pos2::new(0.0, 0.0), Pos2::new(100.0, 0.0), Pos2::new(100.0, 100.0)] {
            lasso.click(p, clock.now());
        }
        assert_eq!(lasso.click(Pos2::new(20.0, 0.0), clock.now()), LassoClick::CloseRequested);
    }
}
