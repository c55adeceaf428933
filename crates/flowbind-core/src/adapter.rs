//! The generic event adapter.
//!
//! An [`EventAdapter`] pairs a [`ListenerSource`] with a pure mapping from raw
//! callback arguments to a domain event. Binding it installs one native
//! listener and returns one of three consumer handles:
//!
//! - [`CallbackHandle`]: a task that runs an action for each event, in order
//! - [`EventChannel`]: a buffered channel read with `recv().await`
//! - [`EventStream`]: a lazy `Stream` that registers on first poll
//!
//! Each binding moves through `Unbound -> Bound -> Unbinding -> Unbound`.
//! Teardown (scope cancellation, widget detachment, explicit close or
//! dropping the handle) runs exactly once: the listener is unregistered if
//! the slot still holds it and the buffer is closed. No event is delivered
//! after teardown begins.

use crate::buffer::{BufferPolicy, BufferStats, EventBuffer, PushOutcome};
use crate::config::AdapterConfig;
use crate::error::{Error, Result, TryRecvError};
use crate::scope::Scope;
use crate::slot::{ListenerSource, NativeListener};
use futures::future::poll_fn;
use futures::stream::{FusedStream, Stream};
use parking_lot::Mutex;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Pure mapping from raw callback arguments to a domain event. `None`
/// filters the invocation out.
pub type Mapper<A, E> = Arc<dyn Fn(A) -> Option<E> + Send + Sync>;

/// Decides whether an event is consumed. Unconsumed events are not
/// delivered and the native callback reports "not handled".
pub type HandledPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Supplies the widget's current value, emitted first on bind.
pub type InitialValue<E> = Arc<dyn Fn() -> E + Send + Sync>;

type Finalizer = Box<dyn FnOnce() + Send>;
type Activation = Box<dyn FnOnce() + Send>;

/// Identifies one binding in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(Uuid);

impl BindingId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a single binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// No listener registered.
    Unbound,
    /// Listener registered, events flowing.
    Bound,
    /// Teardown in progress; events are suppressed.
    Unbinding,
}

/// Which consumer surface a binding uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Action invoked for each event.
    Callback,
    /// Buffered channel.
    Channel,
    /// Lazy stream.
    Stream,
}

/// Delivery configuration passed to [`EventAdapter::bind`].
pub enum Delivery<E> {
    /// Run the action for each event, sequentially, on the dispatcher.
    Callback(Box<dyn FnMut(E) + Send + 'static>),
    /// Queue events in a channel with the given policy.
    Channel(BufferPolicy),
    /// Produce a lazy stream buffered with the given policy.
    Stream(BufferPolicy),
}

impl<E> Delivery<E> {
    /// Callback delivery from a closure.
    pub fn callback(action: impl FnMut(E) + Send + 'static) -> Self {
        Delivery::Callback(Box::new(action))
    }

    /// The delivery mode.
    pub fn mode(&self) -> DeliveryMode {
        match self {
            Delivery::Callback(_) => DeliveryMode::Callback,
            Delivery::Channel(_) => DeliveryMode::Channel,
            Delivery::Stream(_) => DeliveryMode::Stream,
        }
    }
}

impl<E> fmt::Debug for Delivery<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Callback(_) => write!(f, "Callback(<function>)"),
            Delivery::Channel(policy) => write!(f, "Channel({})", policy),
            Delivery::Stream(policy) => write!(f, "Stream({})", policy),
        }
    }
}

struct Lifecycle {
    state: BindingState,
    finished: bool,
    finalizers: Vec<Finalizer>,
}

/// State shared by the native listener, the scope cleanups and the
/// consumer handle of one binding.
struct BindingCore<E> {
    id: BindingId,
    name: String,
    buffer: EventBuffer<E>,
    lifecycle: Mutex<Lifecycle>,
    trace_events: bool,
    log_overflow: bool,
}

impl<E> BindingCore<E> {
    fn new(name: String, policy: BufferPolicy, config: &AdapterConfig) -> Arc<Self> {
        Arc::new(Self {
            id: BindingId::new(),
            name,
            buffer: EventBuffer::new(policy),
            lifecycle: Mutex::new(Lifecycle {
                state: BindingState::Unbound,
                finished: false,
                finalizers: Vec::new(),
            }),
            trace_events: config.trace_events,
            log_overflow: config.log_overflow,
        })
    }

    fn state(&self) -> BindingState {
        self.lifecycle.lock().state
    }

    fn is_bound(&self) -> bool {
        self.state() == BindingState::Bound
    }

    fn mark_bound(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.finished {
            return false;
        }
        lifecycle.state = BindingState::Bound;
        true
    }

    fn add_finalizer(&self, finalizer: Finalizer) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.finished {
            drop(lifecycle);
            finalizer();
        } else {
            lifecycle.finalizers.push(finalizer);
        }
    }

    /// Returns `false` if the binding was already torn down.
    fn teardown(&self, reason: &str) -> bool {
        let finalizers = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.finished {
                return false;
            }
            lifecycle.finished = true;
            lifecycle.state = BindingState::Unbinding;
            std::mem::take(&mut lifecycle.finalizers)
        };

        debug!(binding = %self.id, source = %self.name, reason, "Tearing down binding");
        for finalizer in finalizers {
            finalizer();
        }
        self.buffer.close();

        self.lifecycle.lock().state = BindingState::Unbound;
        true
    }
}

impl<E: fmt::Debug> BindingCore<E> {
    fn deliver(&self, event: E) -> PushOutcome {
        let rendered = self.trace_events.then(|| format!("{:?}", event));
        let outcome = self.buffer.push(event);

        if outcome == PushOutcome::Dropped && self.log_overflow {
            warn!(
                binding = %self.id,
                source = %self.name,
                policy = %self.buffer.policy(),
                "Event dropped under backpressure"
            );
        }
        if let Some(event) = rendered {
            trace!(binding = %self.id, source = %self.name, ?outcome, %event, "Event offered");
        }
        outcome
    }

    /// Queue the initial value. It skips the overflow policy, so it is
    /// never dropped and never blocks the binding thread.
    fn seed(&self, event: E) -> PushOutcome {
        let rendered = self.trace_events.then(|| format!("{:?}", event));
        let outcome = self.buffer.seed(event);
        if let Some(event) = rendered {
            trace!(
                binding = %self.id,
                source = %self.name,
                ?outcome,
                %event,
                "Initial value queued"
            );
        }
        outcome
    }
}

/// Type-erased control over a binding.
trait BindingControl: Send + Sync {
    fn close(&self, reason: &str) -> bool;
    fn state(&self) -> BindingState;
    fn stats(&self) -> BufferStats;
}

impl<E: Send> BindingControl for BindingCore<E> {
    fn close(&self, reason: &str) -> bool {
        self.teardown(reason)
    }

    fn state(&self) -> BindingState {
        BindingCore::state(self)
    }

    fn stats(&self) -> BufferStats {
        self.buffer.stats()
    }
}

/// Register the native listener and wire teardown to both the owning scope
/// and the widget attachment.
fn activate<S, E, Sc>(
    core: &Arc<BindingCore<E>>,
    source: &Arc<S>,
    scope: &Sc,
    map: &Mapper<S::Args, E>,
    handled: &HandledPredicate<E>,
    initial: Option<&InitialValue<E>>,
) -> Result<()>
where
    S: ListenerSource,
    E: fmt::Debug + Send + 'static,
    Sc: Scope + Clone + 'static,
{
    if !source.is_available() {
        core.teardown("widget unavailable");
        return Err(Error::WidgetUnavailable(core.name.clone()));
    }
    if !scope.is_active() {
        core.teardown("scope cancelled before bind");
        return Err(Error::ScopeCancelled(core.name.clone()));
    }

    if let Some(initial) = initial {
        core.seed(initial());
    }

    let listener: NativeListener<S::Args> = {
        let weak = Arc::downgrade(core);
        let scope = scope.clone();
        let map = map.clone();
        let handled = handled.clone();
        Arc::new(move |args: S::Args| {
            let Some(core) = weak.upgrade() else {
                return false;
            };
            if !core.is_bound() || !scope.is_active() {
                trace!(binding = %core.id, "Callback after teardown suppressed");
                return false;
            }
            let Some(event) = map(args) else {
                return false;
            };
            if !handled(&event) {
                return false;
            }
            core.deliver(event);
            true
        })
    };

    if !core.mark_bound() {
        return Ok(());
    }
    let registration = source.register(listener);
    debug!(
        binding = %core.id,
        source = %core.name,
        %registration,
        policy = %core.buffer.policy(),
        "Listener registered"
    );

    {
        let source = source.clone();
        let name = core.name.clone();
        core.add_finalizer(Box::new(move || {
            if !source.unregister(registration) {
                debug!(%registration, source = %name, "Listener already replaced, slot left as is");
            }
        }));
    }

    let weak = Arc::downgrade(core);
    let owner_key = scope.on_cancel(Box::new(move || {
        if let Some(core) = weak.upgrade() {
            core.teardown("scope cancelled");
        }
    }));
    if let Some(key) = owner_key {
        let scope = scope.clone();
        core.add_finalizer(Box::new(move || scope.remove_cleanup(key)));
    }

    let weak = Arc::downgrade(core);
    let attachment_key = source.attachment().on_cancel(Box::new(move || {
        if let Some(core) = weak.upgrade() {
            core.teardown("widget detached");
        }
    }));
    if let Some(key) = attachment_key {
        let source = source.clone();
        core.add_finalizer(Box::new(move || source.attachment().remove_cleanup(key)));
    }

    Ok(())
}

/// Binds one [`ListenerSource`] to event consumers.
pub struct EventAdapter<S: ListenerSource, E> {
    source: Arc<S>,
    map: Mapper<S::Args, E>,
    handled: HandledPredicate<E>,
    initial: Option<InitialValue<E>>,
    dispatcher: Option<Handle>,
    config: AdapterConfig,
}

impl<S, E> EventAdapter<S, E>
where
    S: ListenerSource,
    E: fmt::Debug + Send + 'static,
{
    /// Adapter emitting one event per callback invocation.
    pub fn new(source: S, map: impl Fn(S::Args) -> E + Send + Sync + 'static) -> Self {
        Self::filter_map(source, move |args| Some(map(args)))
    }

    /// Adapter whose mapping may skip invocations.
    pub fn filter_map(
        source: S,
        map: impl Fn(S::Args) -> Option<E> + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Arc::new(source),
            map: Arc::new(map),
            handled: Arc::new(|_: &E| true),
            initial: None,
            dispatcher: None,
            config: AdapterConfig::default(),
        }
    }

    /// Only deliver, and report as consumed, events matching `handled`.
    pub fn with_handled(mut self, handled: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.handled = Arc::new(handled);
        self
    }

    /// Emit the widget's current value before any callback event.
    pub fn with_initial_value(mut self, initial: impl Fn() -> E + Send + Sync + 'static) -> Self {
        self.initial = Some(Arc::new(initial));
        self
    }

    /// Drop the initial value, if any.
    pub fn skip_initial_value(mut self) -> Self {
        self.initial = None;
        self
    }

    /// Whether bindings start with the current value.
    pub fn has_initial_value(&self) -> bool {
        self.initial.is_some()
    }

    /// Run callback delivery on the given runtime instead of the current one.
    pub fn dispatch_on(mut self, handle: Handle) -> Self {
        self.dispatcher = Some(handle);
        self
    }

    /// Replace the adapter configuration.
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// The adapter configuration.
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// The bound source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Source name, e.g. `"view.clicks"`.
    pub fn name(&self) -> String {
        self.source.name()
    }

    /// Bind with an explicit delivery mode.
    pub fn bind<Sc>(&self, scope: &Sc, delivery: Delivery<E>) -> Result<EventSource<E>>
    where
        Sc: Scope + Clone + 'static,
    {
        match delivery {
            Delivery::Callback(action) => {
                self.bind_callback(scope, action).map(EventSource::Callback)
            }
            Delivery::Channel(policy) => self.channel(scope, policy).map(EventSource::Channel),
            Delivery::Stream(policy) => self.stream(scope, policy).map(EventSource::Stream),
        }
    }

    /// Run `action` for every event until the scope ends.
    ///
    /// Dropping the returned handle does not end the binding.
    pub fn on_each<Sc>(
        &self,
        scope: &Sc,
        action: impl FnMut(E) + Send + 'static,
    ) -> Result<CallbackHandle>
    where
        Sc: Scope + Clone + 'static,
    {
        self.bind_callback(scope, Box::new(action))
    }

    fn bind_callback<Sc>(
        &self,
        scope: &Sc,
        mut action: Box<dyn FnMut(E) + Send + 'static>,
    ) -> Result<CallbackHandle>
    where
        Sc: Scope + Clone + 'static,
    {
        self.ensure_bindable(scope)?;
        let runtime = match &self.dispatcher {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| Error::NoRuntime(self.name()))?,
        };

        let core = BindingCore::new(self.name(), BufferPolicy::Unbounded, &self.config);
        activate(
            &core,
            &self.source,
            scope,
            &self.map,
            &self.handled,
            self.initial.as_ref(),
        )?;

        let worker = core.clone();
        let task = runtime.spawn(async move {
            while let Some(event) = poll_fn(|cx| worker.buffer.poll_recv(cx)).await {
                action(event);
            }
            trace!(binding = %worker.id, "Callback delivery finished");
        });

        Ok(CallbackHandle {
            id: core.id,
            control: core,
            task,
        })
    }

    /// Bind to a buffered channel.
    pub fn channel<Sc>(&self, scope: &Sc, policy: BufferPolicy) -> Result<EventChannel<E>>
    where
        Sc: Scope + Clone + 'static,
    {
        policy.validate()?;
        let core = BindingCore::new(self.name(), policy, &self.config);
        activate(
            &core,
            &self.source,
            scope,
            &self.map,
            &self.handled,
            self.initial.as_ref(),
        )?;
        Ok(EventChannel { core })
    }

    /// Bind to a lazy stream. Availability is checked now; the listener is
    /// registered when the stream is first polled.
    pub fn stream<Sc>(&self, scope: &Sc, policy: BufferPolicy) -> Result<EventStream<E>>
    where
        Sc: Scope + Clone + 'static,
    {
        policy.validate()?;
        self.ensure_bindable(scope)?;

        let core = BindingCore::new(self.name(), policy, &self.config);
        let activation: Activation = {
            let weak = Arc::downgrade(&core);
            let source = self.source.clone();
            let scope = scope.clone();
            let map = self.map.clone();
            let handled = self.handled.clone();
            let initial = self.initial.clone();
            Box::new(move || {
                let Some(core) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = activate(&core, &source, &scope, &map, &handled, initial.as_ref())
                {
                    debug!(binding = %core.id, error = %e, "Stream ended before first event");
                }
            })
        };

        Ok(EventStream {
            core,
            activation: Some(activation),
            terminated: false,
        })
    }

    fn ensure_bindable<Sc: Scope>(&self, scope: &Sc) -> Result<()> {
        if !self.source.is_available() {
            return Err(Error::WidgetUnavailable(self.name()));
        }
        if !scope.is_active() {
            return Err(Error::ScopeCancelled(self.name()));
        }
        Ok(())
    }

    /// Channel using the configured channel policy.
    pub fn default_channel<Sc>(&self, scope: &Sc) -> Result<EventChannel<E>>
    where
        Sc: Scope + Clone + 'static,
    {
        self.channel(scope, self.config.channel_policy)
    }

    /// Stream using the configured stream policy.
    pub fn default_stream<Sc>(&self, scope: &Sc) -> Result<EventStream<E>>
    where
        Sc: Scope + Clone + 'static,
    {
        self.stream(scope, self.config.stream_policy)
    }
}

impl<S: ListenerSource, E> Clone for EventAdapter<S, E> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            map: self.map.clone(),
            handled: self.handled.clone(),
            initial: self.initial.clone(),
            dispatcher: self.dispatcher.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: ListenerSource, E> fmt::Debug for EventAdapter<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventAdapter")
            .field("source", &self.source.name())
            .field("initial_value", &self.initial.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// Handle to a callback-delivery binding.
pub struct CallbackHandle {
    id: BindingId,
    control: Arc<dyn BindingControl>,
    task: JoinHandle<()>,
}

impl CallbackHandle {
    /// Binding id.
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// End the binding. Idempotent.
    pub fn cancel(&self) {
        self.control.close("cancelled by consumer");
    }

    /// Whether events are still flowing.
    pub fn is_active(&self) -> bool {
        self.control.state() == BindingState::Bound
    }

    /// Current binding state.
    pub fn state(&self) -> BindingState {
        self.control.state()
    }

    /// Buffer statistics.
    pub fn stats(&self) -> BufferStats {
        self.control.stats()
    }

    /// Wait for the delivery task to finish after teardown.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(binding = %self.id, error = %e, "Callback delivery task failed");
        }
    }
}

impl fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Buffered channel of events. Dropping it ends the binding.
pub struct EventChannel<E> {
    core: Arc<BindingCore<E>>,
}

impl<E> EventChannel<E> {
    /// Binding id.
    pub fn id(&self) -> BindingId {
        self.core.id
    }

    /// Wait for the next event. `None` means the binding is over.
    ///
    /// Cancel safe: dropping the future stops counting as a waiting
    /// consumer.
    pub async fn recv(&mut self) -> Option<E> {
        let waiting = WaitGuard(&self.core.buffer);
        poll_fn(|cx| waiting.0.poll_recv(cx)).await
    }

    /// Take the next event if one is buffered.
    pub fn try_recv(&mut self) -> std::result::Result<E, TryRecvError> {
        self.core.buffer.try_recv()
    }

    /// End the binding. Idempotent.
    pub fn close(&self) {
        self.core.teardown("channel closed by consumer");
    }

    /// Current binding state.
    pub fn state(&self) -> BindingState {
        self.core.state()
    }

    /// Buffer statistics.
    pub fn stats(&self) -> BufferStats {
        self.core.buffer.stats()
    }
}

struct WaitGuard<'a, E>(&'a EventBuffer<E>);

impl<E> Drop for WaitGuard<'_, E> {
    fn drop(&mut self) {
        self.0.cancel_wait();
    }
}

impl<E> Stream for EventChannel<E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.core.buffer.poll_recv(cx)
    }
}

impl<E> Drop for EventChannel<E> {
    fn drop(&mut self) {
        self.core.teardown("channel dropped");
    }
}

impl<E> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("id", &self.core.id)
            .field("source", &self.core.name)
            .field("state", &self.core.state())
            .finish()
    }
}

/// Lazy, single-subscriber stream of events. Registers on first poll, ends
/// on teardown and never restarts. Dropping it ends the binding.
pub struct EventStream<E> {
    core: Arc<BindingCore<E>>,
    activation: Option<Activation>,
    terminated: bool,
}

impl<E> EventStream<E> {
    /// Binding id.
    pub fn id(&self) -> BindingId {
        self.core.id
    }

    /// Whether the listener has been registered yet.
    pub fn is_subscribed(&self) -> bool {
        self.activation.is_none()
    }

    /// End the binding. Idempotent.
    pub fn close(&self) {
        self.core.teardown("stream closed by consumer");
    }

    /// Current binding state.
    pub fn state(&self) -> BindingState {
        self.core.state()
    }

    /// Buffer statistics.
    pub fn stats(&self) -> BufferStats {
        self.core.buffer.stats()
    }
}

impl<E> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }
        if let Some(activate) = this.activation.take() {
            activate();
        }
        match this.core.buffer.poll_recv(cx) {
            Poll::Ready(None) => {
                this.terminated = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl<E> FusedStream for EventStream<E> {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<E> Drop for EventStream<E> {
    fn drop(&mut self) {
        self.core.teardown("stream dropped");
    }
}

impl<E> fmt::Debug for EventStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("id", &self.core.id)
            .field("source", &self.core.name)
            .field("subscribed", &self.is_subscribed())
            .field("terminated", &self.terminated)
            .finish()
    }
}

/// Consumer handle returned by [`EventAdapter::bind`].
#[derive(Debug)]
pub enum EventSource<E> {
    /// Callback delivery.
    Callback(CallbackHandle),
    /// Queued-channel delivery.
    Channel(EventChannel<E>),
    /// Reactive-stream delivery.
    Stream(EventStream<E>),
}

impl<E> EventSource<E> {
    /// The delivery mode.
    pub fn mode(&self) -> DeliveryMode {
        match self {
            EventSource::Callback(_) => DeliveryMode::Callback,
            EventSource::Channel(_) => DeliveryMode::Channel,
            EventSource::Stream(_) => DeliveryMode::Stream,
        }
    }

    /// Binding id.
    pub fn id(&self) -> BindingId {
        match self {
            EventSource::Callback(handle) => handle.id(),
            EventSource::Channel(channel) => channel.id(),
            EventSource::Stream(stream) => stream.id(),
        }
    }

    /// Current binding state.
    pub fn state(&self) -> BindingState {
        match self {
            EventSource::Callback(handle) => handle.state(),
            EventSource::Channel(channel) => channel.state(),
            EventSource::Stream(stream) => stream.state(),
        }
    }

    /// End the binding. Idempotent.
    pub fn close(&self) {
        match self {
            EventSource::Callback(handle) => handle.cancel(),
            EventSource::Channel(channel) => channel.close(),
            EventSource::Stream(stream) => stream.close(),
        }
    }

    /// The channel, if this is a channel binding.
    pub fn into_channel(self) -> Option<EventChannel<E>> {
        match self {
            EventSource::Channel(channel) => Some(channel),
            _ => None,
        }
    }

    /// The stream, if this is a stream binding.
    pub fn into_stream(self) -> Option<EventStream<E>> {
        match self {
            EventSource::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// The callback handle, if this is a callback binding.
    pub fn into_callback(self) -> Option<CallbackHandle> {
        match self {
            EventSource::Callback(handle) => Some(handle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::OverflowPolicy;
    use crate::scope::LifecycleScope;
    use crate::slot::{ListenerSlot, Widget, WidgetSlot};
    use futures::task::noop_waker_ref;
    use futures::StreamExt;
    use std::time::Duration;

    struct Button {
        attachment: LifecycleScope,
        clicks: ListenerSlot<u32>,
    }

    impl Button {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                attachment: LifecycleScope::new("button"),
                clicks: ListenerSlot::new(),
            })
        }

        fn click_slot(&self) -> &ListenerSlot<u32> {
            &self.clicks
        }
    }

    impl Widget for Button {
        fn widget_name(&self) -> &str {
            "button"
        }

        fn attachment(&self) -> &LifecycleScope {
            &self.attachment
        }
    }

    type ClickAdapter = EventAdapter<WidgetSlot<Button, u32>, u32>;

    fn adapter(button: &Arc<Button>) -> ClickAdapter {
        EventAdapter::new(
            WidgetSlot::new(button.clone(), "clicks", Button::click_slot),
            |n| n,
        )
    }

    #[test]
    fn test_channel_preserves_order() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut channel = adapter(&button)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();

        for n in 1..=3 {
            assert!(button.clicks.fire(n));
        }
        assert_eq!(channel.try_recv(), Ok(1));
        assert_eq!(channel.try_recv(), Ok(2));
        assert_eq!(channel.try_recv(), Ok(3));
        assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(channel.state(), BindingState::Bound);
    }

    #[test]
    fn test_scope_cancel_stops_delivery() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut channel = adapter(&button)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();

        button.clicks.fire(1);
        scope.cancel();
        assert!(!button.clicks.fire(2));

        assert!(!button.clicks.is_set());
        assert_eq!(channel.try_recv(), Err(TryRecvError::Closed));
        assert_eq!(channel.state(), BindingState::Unbound);
        assert_eq!(channel.stats().discarded, 1);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let channel = adapter(&button)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();
        assert_eq!(scope.pending_cleanups(), 1);
        assert_eq!(button.attachment.pending_cleanups(), 1);

        channel.close();
        channel.close();
        assert_eq!(scope.pending_cleanups(), 0);
        assert_eq!(button.attachment.pending_cleanups(), 0);

        scope.cancel();
        drop(channel);
        assert_eq!(button.clicks.registration(), None);
    }

    #[test]
    fn test_bind_time_errors() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");

        assert!(matches!(
            adapter(&button).channel(&scope, BufferPolicy::buffered(0)),
            Err(Error::InvalidBufferPolicy(_))
        ));

        let cancelled = LifecycleScope::new("cancelled");
        cancelled.cancel();
        match adapter(&button).channel(&cancelled, BufferPolicy::Conflated) {
            Err(Error::ScopeCancelled(name)) => assert_eq!(name, "button.clicks"),
            other => panic!("Expected ScopeCancelled, got: {:?}", other),
        }

        button.attachment.cancel();
        assert!(matches!(
            adapter(&button).channel(&scope, BufferPolicy::Conflated),
            Err(Error::WidgetUnavailable(_))
        ));
        assert!(matches!(
            adapter(&button).stream(&scope, BufferPolicy::Conflated),
            Err(Error::WidgetUnavailable(_))
        ));
        assert!(!button.clicks.is_set());
    }

    #[test]
    fn test_rebind_orphans_previous_binding() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut first = adapter(&button)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();
        let mut second = adapter(&button)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();

        button.clicks.fire(7);
        assert_eq!(first.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(second.try_recv(), Ok(7));

        let current = button.clicks.registration();
        drop(first);
        assert_eq!(button.clicks.registration(), current);
        button.clicks.fire(8);
        assert_eq!(second.try_recv(), Ok(8));
    }

    #[test]
    fn test_handled_predicate_gates_delivery() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut channel = adapter(&button)
            .with_handled(|n| n % 2 == 0)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();

        assert!(!button.clicks.fire(1));
        assert!(button.clicks.fire(2));
        assert_eq!(channel.try_recv(), Ok(2));
        assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_filter_map_skips_invocations() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let adapter: EventAdapter<_, String> = EventAdapter::filter_map(
            WidgetSlot::new(button.clone(), "clicks", Button::click_slot),
            |n: u32| (n > 10).then(|| format!("big {}", n)),
        );
        let mut channel = adapter.channel(&scope, BufferPolicy::Unbounded).unwrap();

        assert!(!button.clicks.fire(3));
        assert!(button.clicks.fire(30));
        assert_eq!(channel.try_recv(), Ok("big 30".to_string()));
    }

    #[test]
    fn test_initial_value_comes_first() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let adapter = adapter(&button).with_initial_value(|| 0);
        assert!(adapter.has_initial_value());

        let mut channel = adapter.channel(&scope, BufferPolicy::Unbounded).unwrap();
        button.clicks.fire(1);
        assert_eq!(channel.try_recv(), Ok(0));
        assert_eq!(channel.try_recv(), Ok(1));

        let mut skipped = adapter
            .skip_initial_value()
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();
        assert_eq!(skipped.try_recv(), Err(TryRecvError::Empty));
    }

    fn rendezvous(overflow: OverflowPolicy) -> BufferPolicy {
        BufferPolicy::Rendezvous { overflow }
    }

    #[test]
    fn test_rendezvous_initial_value_does_not_block_bind() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let adapter = adapter(&button).with_initial_value(|| 0);

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let bound = adapter.channel(&scope, rendezvous(OverflowPolicy::Suspend));
            let _ = tx.send(bound.map(|mut channel| channel.try_recv()));
        });

        match rx.recv_timeout(Duration::from_secs(2)) {
            Ok(Ok(first)) => assert_eq!(first, Ok(0)),
            other => panic!("Expected bind to return, got: {:?}", other),
        }
    }

    #[test]
    fn test_rendezvous_initial_value_is_never_dropped() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut channel = adapter(&button)
            .with_initial_value(|| 0)
            .channel(&scope, rendezvous(OverflowPolicy::DropLatest))
            .unwrap();

        assert_eq!(channel.stats().dropped, 0);
        assert_eq!(channel.stats().current_size, 1);
        assert_eq!(channel.try_recv(), Ok(0));

        // Nobody is waiting any more.
        assert!(button.clicks.fire(1));
        assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(channel.stats().dropped, 1);
    }

    #[tokio::test]
    async fn test_rendezvous_stream_starts_with_initial_value() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut stream = adapter(&button)
            .with_initial_value(|| 0)
            .stream(&scope, rendezvous(OverflowPolicy::Suspend))
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), stream.next()).await;
        assert_eq!(first.ok(), Some(Some(0)));
        assert!(button.clicks.is_set());
    }

    #[tokio::test]
    async fn test_rendezvous_hands_over_to_waiting_recv() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut channel = adapter(&button)
            .channel(&scope, rendezvous(OverflowPolicy::DropLatest))
            .unwrap();

        let reader = tokio::spawn(async move {
            let event = channel.recv().await;
            (event, channel.stats().dropped)
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(button.clicks.fire(9));
        let (event, dropped) = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader should get the event")
            .unwrap();
        assert_eq!(event, Some(9));
        assert_eq!(dropped, 0);
    }

    #[tokio::test]
    async fn test_abandoned_recv_stops_rendezvous_hand_off() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut channel = adapter(&button)
            .channel(&scope, rendezvous(OverflowPolicy::DropLatest))
            .unwrap();

        let waited = tokio::time::timeout(Duration::from_millis(10), channel.recv()).await;
        assert!(waited.is_err());

        button.clicks.fire(1);
        assert_eq!(channel.stats().dropped, 1);
        assert_eq!(channel.stats().current_size, 0);
    }

    #[test]
    fn test_try_recv_stops_rendezvous_hand_off() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut channel = adapter(&button)
            .channel(&scope, rendezvous(OverflowPolicy::DropLatest))
            .unwrap();

        let mut cx = Context::from_waker(noop_waker_ref());
        assert!(Pin::new(&mut channel).poll_next(&mut cx).is_pending());
        button.clicks.fire(1);
        assert_eq!(channel.try_recv(), Ok(1));

        button.clicks.fire(2);
        assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(channel.stats().dropped, 1);
    }

    #[test]
    fn test_conflated_channel_keeps_latest() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut channel = adapter(&button)
            .channel(&scope, BufferPolicy::Conflated)
            .unwrap();

        for n in 1..=5 {
            button.clicks.fire(n);
        }
        assert_eq!(channel.try_recv(), Ok(5));
        assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_bounded_drop_is_not_an_error() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let config = AdapterConfig::default().with_channel_policy(BufferPolicy::Bounded {
            capacity: 1,
            overflow: OverflowPolicy::DropLatest,
        });
        let mut channel = adapter(&button)
            .with_config(config)
            .default_channel(&scope)
            .unwrap();

        assert!(button.clicks.fire(1));
        assert!(button.clicks.fire(2));
        assert_eq!(channel.try_recv(), Ok(1));
        assert_eq!(channel.stats().dropped, 1);
    }

    #[tokio::test]
    async fn test_stream_registers_on_first_poll() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut stream = adapter(&button)
            .stream(&scope, BufferPolicy::Unbounded)
            .unwrap();
        assert!(!button.clicks.is_set());
        assert!(!stream.is_subscribed());

        let mut cx = Context::from_waker(noop_waker_ref());
        assert!(Pin::new(&mut stream).poll_next(&mut cx).is_pending());
        assert!(stream.is_subscribed());
        assert!(button.clicks.is_set());

        button.clicks.fire(4);
        assert_eq!(stream.next().await, Some(4));
    }

    #[tokio::test]
    async fn test_stream_ends_on_detach() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut stream = adapter(&button)
            .stream(&scope, BufferPolicy::Unbounded)
            .unwrap();

        let mut cx = Context::from_waker(noop_waker_ref());
        assert!(Pin::new(&mut stream).poll_next(&mut cx).is_pending());
        button.attachment.cancel();

        assert_eq!(stream.next().await, None);
        assert!(stream.is_terminated());
        assert_eq!(stream.next().await, None);
        assert!(scope.is_active());
        assert_eq!(scope.pending_cleanups(), 0);
    }

    #[test]
    fn test_stream_closed_before_poll_never_registers() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let mut stream = adapter(&button)
            .stream(&scope, BufferPolicy::Unbounded)
            .unwrap();
        stream.close();

        let mut cx = Context::from_waker(noop_waker_ref());
        assert_eq!(Pin::new(&mut stream).poll_next(&mut cx), Poll::Ready(None));
        assert!(!button.clicks.is_set());
    }

    #[tokio::test]
    async fn test_callback_delivery() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = adapter(&button)
            .on_each(&scope, move |n| {
                let _ = tx.send(n);
            })
            .unwrap();
        assert!(handle.is_active());

        for n in 1..=3 {
            button.clicks.fire(n);
        }
        for expected in 1..=3 {
            assert_eq!(rx.recv().await, Some(expected));
        }

        handle.cancel();
        assert!(!handle.is_active());
        assert!(!button.clicks.fire(4));
        handle.join().await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_bind_returns_matching_source() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        let adapter = adapter(&button);

        let source = adapter
            .bind(&scope, Delivery::Channel(BufferPolicy::Conflated))
            .unwrap();
        assert_eq!(source.mode(), DeliveryMode::Channel);
        assert!(source.into_channel().is_some());

        let source = adapter
            .bind(&scope, Delivery::Stream(BufferPolicy::Unbounded))
            .unwrap();
        assert_eq!(source.mode(), DeliveryMode::Stream);
        assert!(source.into_callback().is_none());

        let source = adapter.bind(&scope, Delivery::callback(|_| {})).unwrap();
        assert_eq!(source.state(), BindingState::Bound);
        source.close();
        assert_eq!(source.state(), BindingState::Unbound);
    }

    #[test]
    fn test_callback_without_runtime() {
        let button = Button::new();
        let scope = LifecycleScope::new("test");
        assert!(matches!(
            adapter(&button).on_each(&scope, |_| {}),
            Err(Error::NoRuntime(_))
        ));
        assert!(!button.clicks.is_set());
    }

    #[test]
    fn test_callback_bind_errors_ignore_missing_runtime() {
        let button = Button::new();
        let cancelled = LifecycleScope::new("cancelled");
        cancelled.cancel();
        assert!(matches!(
            adapter(&button).on_each(&cancelled, |_| {}),
            Err(Error::ScopeCancelled(_))
        ));

        button.attachment.cancel();
        match adapter(&button).on_each(&cancelled, |_| {}) {
            Err(Error::WidgetUnavailable(name)) => assert_eq!(name, "button.clicks"),
            other => panic!("Expected WidgetUnavailable, got: {:?}", other),
        }
    }
}
