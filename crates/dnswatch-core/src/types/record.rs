//! Dynamic records under liveness control.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::rule::{RuleError, RuleExpr};
use crate::types::{AliveChange, AliveTransition, NotifyTrigger, Target, TargetSpec};

/// Default watch interval in scheduler ticks
pub const DEFAULT_WATCH_INTERVAL: u32 = 10;

/// A DNS record whose liveness is computed from its targets.
///
/// Targets are owned by the record. All mutable fields are atomics so a
/// record can be shared between the scheduler, evaluation cycles and
/// readers without locking:
///
/// - the interval counter is advanced by the scheduler tick
/// - the progress flag guards single-flight evaluation
/// - the alive flag is replaced once per completed cycle
/// - the force-down flag is an administrative override for readers
#[derive(Debug)]
pub struct Record {
    zone: String,
    group: String,
    name: String,
    record_type: String,
    ttl: u32,
    content: String,
    targets: Vec<Target>,
    rule_source: String,
    rule: Result<RuleExpr, RuleError>,
    watch_interval: u32,
    notify_triggers: Vec<NotifyTrigger>,
    interval_count: AtomicU32,
    in_progress: AtomicBool,
    alive: AtomicBool,
    force_down: AtomicBool,
}

impl Record {
    /// Start building a record
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        record_type: impl Into<String>,
        content: impl Into<String>,
    ) -> RecordBuilder {
        RecordBuilder::new(name, record_type, content)
    }

    /// Zone the record belongs to
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Dynamic group the record belongs to
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Owner name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record type
    #[must_use]
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Record TTL
    #[must_use]
    pub const fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Record content
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Owned targets
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Find an owned target by name
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name() == name)
    }

    /// Rule expression as written in configuration
    #[must_use]
    pub fn rule_source(&self) -> &str {
        &self.rule_source
    }

    /// Parsed rule, or the error that prevented parsing
    pub const fn rule(&self) -> Result<&RuleExpr, &RuleError> {
        self.rule.as_ref()
    }

    /// Watch interval in scheduler ticks
    #[must_use]
    pub const fn watch_interval(&self) -> u32 {
        self.watch_interval
    }

    /// Notification policies
    #[must_use]
    pub fn notify_triggers(&self) -> &[NotifyTrigger] {
        &self.notify_triggers
    }

    /// Evaluate the rule against the current target flags.
    pub fn evaluate(&self) -> Result<bool, RuleError> {
        let rule = self.rule.as_ref().map_err(Clone::clone)?;
        rule.eval(&|name| self.target(name).map(Target::alive))
    }

    /// Evaluate the rule, treating every error as dead
    #[must_use]
    pub fn verdict(&self) -> bool {
        self.evaluate().unwrap_or(false)
    }

    /// Advance the interval counter by one tick.
    ///
    /// Returns true once the counter has reached the watch interval. The
    /// counter keeps growing (saturating) until [`Record::reset_interval`].
    pub fn advance_interval(&self) -> bool {
        let previous = self
            .interval_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(count.saturating_add(1))
            })
            .unwrap_or_else(|count| count);
        previous.saturating_add(1) >= self.watch_interval
    }

    /// Restart the interval after launching a cycle
    pub fn reset_interval(&self) {
        self.interval_count.store(0, Ordering::Release);
    }

    /// Try to move the progress flag from idle to in-progress.
    ///
    /// Only the caller that gets `true` may run an evaluation cycle.
    pub fn try_begin_cycle(&self) -> bool {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clear the progress flag
    pub fn finish_cycle(&self) {
        self.in_progress.store(false, Ordering::Release);
    }

    /// Returns true while an evaluation cycle is in flight
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Computed alive flag as published by the last cycle
    #[must_use]
    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Replace the published alive flag, returning the previous value
    /// from the same atomic swap
    pub fn swap_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::AcqRel)
    }

    /// Publish a verdict and report the transition it caused
    pub fn commit(&self, verdict: bool) -> AliveChange {
        let previous = self.swap_alive(verdict);
        AliveChange {
            previous,
            current: verdict,
        }
    }

    /// Administrative override forcing readers to see the record dead
    pub fn set_force_down(&self, force_down: bool) {
        self.force_down.store(force_down, Ordering::Release);
    }

    /// Returns true if the record is forced down
    #[must_use]
    pub fn force_down(&self) -> bool {
        self.force_down.load(Ordering::Acquire)
    }

    /// Alive flag as seen by readers: computed and not forced down
    #[must_use]
    pub fn effective_alive(&self) -> bool {
        self.alive() && !self.force_down()
    }

    /// Returns true if any of the notify triggers fires for `change`
    #[must_use]
    pub fn should_notify(&self, change: AliveChange) -> bool {
        crate::types::should_notify(&self.notify_triggers, change)
    }

    /// Build the notification payload for a change of this record
    #[must_use]
    pub fn transition(&self, change: AliveChange) -> AliveTransition {
        AliveTransition {
            at: chrono::Utc::now(),
            zone: self.zone.clone(),
            group: self.group.clone(),
            name: self.name.clone(),
            record_type: self.record_type.clone(),
            content: self.content.clone(),
            previous: change.previous,
            current: change.current,
        }
    }
}

/// Builder for [`Record`]
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    zone: String,
    group: String,
    name: String,
    record_type: String,
    ttl: u32,
    content: String,
    targets: Vec<TargetSpec>,
    rule: String,
    watch_interval: u32,
    notify_triggers: Vec<NotifyTrigger>,
    alive: bool,
    force_down: bool,
}

impl RecordBuilder {
    fn new(
        name: impl Into<String>,
        record_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            zone: String::new(),
            group: String::new(),
            name: name.into(),
            record_type: record_type.into(),
            ttl: 60,
            content: content.into(),
            targets: Vec::new(),
            rule: String::new(),
            watch_interval: DEFAULT_WATCH_INTERVAL,
            notify_triggers: Vec::new(),
            alive: false,
            force_down: false,
        }
    }

    /// Set the zone and dynamic group the record is published under
    #[must_use]
    pub fn location(mut self, zone: impl Into<String>, group: impl Into<String>) -> Self {
        self.zone = zone.into();
        self.group = group.into();
        self
    }

    /// Set the TTL
    #[must_use]
    pub const fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Add a target
    #[must_use]
    pub fn target(mut self, spec: TargetSpec) -> Self {
        self.targets.push(spec);
        self
    }

    /// Add several targets
    #[must_use]
    pub fn targets(mut self, specs: impl IntoIterator<Item = TargetSpec>) -> Self {
        self.targets.extend(specs);
        self
    }

    /// Set the rule expression
    #[must_use]
    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }

    /// Set the watch interval in ticks (minimum 1)
    #[must_use]
    pub fn watch_interval(mut self, ticks: u32) -> Self {
        self.watch_interval = ticks.max(1);
        self
    }

    /// Add a notify trigger
    #[must_use]
    pub fn notify_trigger(mut self, trigger: NotifyTrigger) -> Self {
        if !self.notify_triggers.contains(&trigger) {
            self.notify_triggers.push(trigger);
        }
        self
    }

    /// Set the alive value published before the first cycle
    #[must_use]
    pub const fn alive(mut self, alive: bool) -> Self {
        self.alive = alive;
        self
    }

    /// Set the initial force-down override
    #[must_use]
    pub const fn force_down(mut self, force_down: bool) -> Self {
        self.force_down = force_down;
        self
    }

    /// Build the record.
    ///
    /// The rule is parsed here; a parse error is kept and makes every
    /// evaluation of the record dead.
    #[must_use]
    pub fn build(self) -> Record {
        let rule = RuleExpr::parse(&self.rule);
        Record {
            zone: self.zone,
            group: self.group,
            name: self.name,
            record_type: self.record_type,
            ttl: self.ttl,
            content: self.content,
            targets: self.targets.into_iter().map(Target::new).collect(),
            rule_source: self.rule,
            rule,
            // Armed so the first tick launches a cycle.
            interval_count: AtomicU32::new(self.watch_interval),
            watch_interval: self.watch_interval,
            notify_triggers: self.notify_triggers,
            in_progress: AtomicBool::new(false),
            alive: AtomicBool::new(self.alive),
            force_down: AtomicBool::new(self.force_down),
        }
    }
}
