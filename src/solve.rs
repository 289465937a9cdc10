use crate::api::Engine;
use crate::db::{Body, BodyItem, PredId};
use crate::env::{EnvArena, EnvId};
use crate::term::TermId;
use crate::trail::Trail;
use crate::unify::{self, unify};
use std::rc::Rc;

#[cfg(feature = "tracing")]
use crate::trace::{debug_span, trace};

/// Unique identifier for a cut flag in the per-query flag arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CutId(u32);

/// Arena of cut flags. A flag is shared between a goal frame and the
/// clause-body frames it spawns; setting it stops the goal frame's clause
/// loop.
#[derive(Debug, Default)]
struct CutFlags {
    flags: Vec<bool>,
}

impl CutFlags {
    fn alloc(&mut self) -> CutId {
        let id = CutId(self.flags.len() as u32);
        self.flags.push(false);
        id
    }

    fn get(&self, id: CutId) -> bool {
        self.flags[id.0 as usize]
    }

    fn set(&mut self, id: CutId) {
        self.flags[id.0 as usize] = true;
    }
}

/// The remaining goal sequence of one resolution frame.
///
/// Shares the underlying item slice; advancing is a position bump, so the
/// same clause body can sit in many continuations at once.
#[derive(Debug, Clone)]
struct Cont {
    items: Rc<[BodyItem]>,
    pos: usize,
}

impl Cont {
    fn new(items: Rc<[BodyItem]>) -> Self {
        Self { items, pos: 0 }
    }

    fn head(&self) -> Option<BodyItem> {
        self.items.get(self.pos).copied()
    }

    fn tail(&self) -> Cont {
        Cont {
            items: self.items.clone(),
            pos: self.pos + 1,
        }
    }
}

/// Where a goal frame stands in its clause loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallPhase {
    /// Ready to attempt the clause at `next_clause`.
    Dispatch,
    /// A child frame is resolving the chosen clause's body.
    AwaitBody,
    /// A grandchild frame is resolving the outer continuation after a
    /// body success.
    AwaitRest,
    /// A child frame is resolving the outer continuation after a native
    /// callback success.
    AwaitRestNative,
}

/// Per-goal-frame state: the clause loop over the goal's predicate.
#[derive(Debug)]
struct CallFrame {
    /// The goal term being solved, interpreted in the frame's environment.
    goal: TermId,
    pred: PredId,
    /// Fresh environment the candidate clause heads live in.
    scratch: EnvId,
    /// Cut flag shared with clause-body frames spawned from here.
    body_cut: CutId,
    next_clause: usize,
    /// Trail mark of the current clause attempt.
    mark: usize,
    phase: CallPhase,
}

/// One activation of body resolution, suspended between steps.
#[derive(Debug)]
enum FrameState {
    /// Not yet dispatched on the continuation head.
    Start,
    /// Empty continuation: succeeded once; the next resume exhausts it.
    Yielded,
    /// Head was the cut marker: a child is resolving the rest; once it is
    /// exhausted, the enclosing frame's cut flag fires.
    CutScope,
    /// Head was a goal.
    Call(CallFrame),
}

/// Borrow-free probe of a frame's state variant.
#[derive(Debug, Clone, Copy)]
enum StateKind {
    Start,
    Yielded,
    CutScope,
    Call,
}

#[derive(Debug)]
struct Frame {
    cont: Cont,
    env: EnvId,
    cut: CutId,
    /// Frame that spawned this one; None for the top-level query frame.
    spawner: Option<usize>,
    state: FrameState,
}

impl Frame {
    fn call(&self) -> &CallFrame {
        match &self.state {
            FrameState::Call(cf) => cf,
            _ => unreachable!("frame is not a goal frame"),
        }
    }

    fn call_mut(&mut self) -> &mut CallFrame {
        match &mut self.state {
            FrameState::Call(cf) => cf,
            _ => unreachable!("frame is not a goal frame"),
        }
    }
}

/// A signal routed from a frame to the frame that spawned it.
#[derive(Debug, Clone, Copy)]
enum Sig {
    /// The child found (another) solution to its continuation.
    Yielded,
    /// The child has no further solutions and has been popped.
    Exhausted,
}

/// What the machine does next.
#[derive(Debug, Clone, Copy)]
enum Pending {
    /// Run or resume the deepest suspended frame.
    RunTop,
    /// Deliver a child signal to a specific frame.
    Deliver { frame: usize, sig: Sig },
}

/// Lazy enumerator of the solutions to a goal sequence.
///
/// The entire search state lives here: the frame stack, the environment
/// arena, the trail, and the cut flags. Asking for the next solution
/// resumes the search exactly at the last choice point. Dropping the
/// enumerator discards everything at once; later queries start from their
/// own fresh arena, so abandonment cannot leak bindings across queries.
pub struct Solutions<'e> {
    engine: &'e Engine,
    envs: EnvArena,
    trail: Trail,
    flags: CutFlags,
    frames: Vec<Frame>,
    pending: Pending,
    root_env: EnvId,
    done: bool,
}

/// One solution: a view of the top-level environment with its accumulated
/// bindings. Extract values before resuming the enumeration — resuming
/// undoes bindings as backtracking continues, which is why this borrows
/// the enumerator.
pub struct Solution<'a> {
    sols: &'a Solutions<'a>,
}

impl Solution<'_> {
    /// Deep-resolve `term` in the query's top-level environment.
    pub fn get(&self, term: TermId) -> TermId {
        self.sols
            .envs
            .resolve_deep(term, self.sols.root_env, self.sols.engine.terms())
    }

    /// The top-level environment id.
    pub fn env(&self) -> EnvId {
        self.sols.root_env
    }

    /// Number of bindings currently recorded in the top-level environment.
    pub fn binding_count(&self) -> usize {
        self.sols.envs.binding_count(self.sols.root_env)
    }
}

impl<'e> Solutions<'e> {
    pub(crate) fn new(engine: &'e Engine, goals: Rc<[BodyItem]>) -> Self {
        let mut envs = EnvArena::new();
        let mut flags = CutFlags::default();
        let root_env = envs.alloc();
        let root_cut = flags.alloc();
        let root = Frame {
            cont: Cont::new(goals),
            env: root_env,
            cut: root_cut,
            spawner: None,
            state: FrameState::Start,
        };
        Self {
            engine,
            envs,
            trail: Trail::new(),
            flags,
            frames: vec![root],
            pending: Pending::RunTop,
            root_env,
            done: false,
        }
    }

    /// Resume the search until the next solution, or None when the space
    /// is exhausted. Not restartable: a finished enumerator stays finished.
    pub fn next_solution(&mut self) -> Option<Solution<'_>> {
        if self.done {
            return None;
        }
        #[cfg(feature = "tracing")]
        let _span = debug_span!("next_solution", frames = self.frames.len()).entered();
        loop {
            let pending = std::mem::replace(&mut self.pending, Pending::RunTop);
            let emitted = match pending {
                Pending::RunTop => {
                    if self.frames.is_empty() {
                        self.done = true;
                        return None;
                    }
                    self.run(self.frames.len() - 1)
                }
                Pending::Deliver { frame, sig } => self.deliver(frame, sig),
            };
            if emitted {
                #[cfg(feature = "tracing")]
                trace!("solution_yielded");
                return Some(Solution { sols: &*self });
            }
            if self.done {
                return None;
            }
        }
    }

    /// The top-level environment id (for direct inspection in tests).
    pub fn root_env(&self) -> EnvId {
        self.root_env
    }

    /// Direct read access to the environment arena (for tests).
    pub fn envs(&self) -> &EnvArena {
        &self.envs
    }

    /// Route a signal to a spawner, or surface it at the query boundary.
    /// Returns true when a solution reached the caller.
    fn bubble(&mut self, to: Option<usize>, sig: Sig) -> bool {
        match to {
            Some(idx) => {
                self.pending = Pending::Deliver { frame: idx, sig };
                false
            }
            None => match sig {
                Sig::Yielded => {
                    self.pending = Pending::RunTop;
                    true
                }
                Sig::Exhausted => {
                    self.done = true;
                    false
                }
            },
        }
    }

    /// Run or resume the deepest frame.
    fn run(&mut self, idx: usize) -> bool {
        debug_assert_eq!(idx, self.frames.len() - 1, "only the top frame runs");
        loop {
            let kind = match &self.frames[idx].state {
                FrameState::Start => StateKind::Start,
                FrameState::Yielded => StateKind::Yielded,
                FrameState::CutScope => StateKind::CutScope,
                FrameState::Call(_) => StateKind::Call,
            };
            match kind {
                StateKind::Start => {
                    match self.frames[idx].cont.head() {
                        None => {
                            // The frame's goal sequence is satisfied.
                            self.frames[idx].state = FrameState::Yielded;
                            let spawner = self.frames[idx].spawner;
                            return self.bubble(spawner, Sig::Yielded);
                        }
                        Some(BodyItem::Cut) => {
                            let child = Frame {
                                cont: self.frames[idx].cont.tail(),
                                env: self.frames[idx].env,
                                cut: self.frames[idx].cut,
                                spawner: Some(idx),
                                state: FrameState::Start,
                            };
                            self.frames[idx].state = FrameState::CutScope;
                            self.frames.push(child);
                            self.pending = Pending::RunTop;
                            return false;
                        }
                        Some(BodyItem::Call(goal)) => {
                            let pred = match self.engine.terms().as_goal(goal) {
                                Some((pred, _)) => pred,
                                None => unreachable!("call items are validated goal terms"),
                            };
                            let scratch = self.envs.alloc();
                            let body_cut = self.flags.alloc();
                            let mark = self.trail.mark();
                            self.frames[idx].state = FrameState::Call(CallFrame {
                                goal,
                                pred,
                                scratch,
                                body_cut,
                                next_clause: 0,
                                mark,
                                phase: CallPhase::Dispatch,
                            });
                            // Loop back into the clause loop.
                        }
                    }
                }
                StateKind::Yielded => {
                    // Resumed after its single success: the frame is spent.
                    let spawner = self.frames[idx].spawner;
                    self.frames.pop();
                    return self.bubble(spawner, Sig::Exhausted);
                }
                StateKind::CutScope => {
                    unreachable!("cut scopes are resumed via deliver, never run")
                }
                StateKind::Call => return self.dispatch(idx),
            }
        }
    }

    /// The clause loop of a goal frame: attempt clauses in declaration
    /// order until one succeeds, the list runs out, or a cut flag fires.
    fn dispatch(&mut self, idx: usize) -> bool {
        let engine = self.engine;
        loop {
            let (goal, pred, scratch, body_cut, next_clause, env, cut) = {
                let frame = &self.frames[idx];
                let cf = frame.call();
                debug_assert_eq!(cf.phase, CallPhase::Dispatch);
                (
                    cf.goal,
                    cf.pred,
                    cf.scratch,
                    cf.body_cut,
                    cf.next_clause,
                    frame.env,
                    frame.cut,
                )
            };

            // Cut commits: once either flag fires, remaining alternatives
            // of this invocation are abandoned.
            if self.flags.get(body_cut) || self.flags.get(cut) {
                return self.exhaust_call(idx);
            }
            let Some(clause) = engine.clauses(pred).get(next_clause) else {
                return self.exhaust_call(idx);
            };

            #[cfg(feature = "tracing")]
            trace!(pred = pred.raw(), clause = next_clause, "clause_attempt");

            let mark = self.trail.mark();
            self.frames[idx].call_mut().mark = mark;

            if !self.unify_head(goal, env, clause.head, scratch) {
                self.trail.undo_to(mark, &mut self.envs);
                self.envs.clear(scratch);
                self.frames[idx].call_mut().next_clause += 1;
                continue;
            }

            match &clause.body {
                Body::Native(callback) => {
                    let callback = callback.clone();
                    let accepted = {
                        let mut view = CallbackEnv {
                            engine,
                            envs: &mut self.envs,
                            trail: &mut self.trail,
                            env: scratch,
                        };
                        callback(&mut view)
                    };
                    if accepted {
                        let child = Frame {
                            cont: self.frames[idx].cont.tail(),
                            env,
                            cut,
                            spawner: Some(idx),
                            state: FrameState::Start,
                        };
                        self.frames[idx].call_mut().phase = CallPhase::AwaitRestNative;
                        self.frames.push(child);
                        self.pending = Pending::RunTop;
                        return false;
                    }
                    self.trail.undo_to(mark, &mut self.envs);
                    self.envs.clear(scratch);
                    self.frames[idx].call_mut().next_clause += 1;
                }
                Body::Goals(items) => {
                    let child = Frame {
                        cont: Cont::new(items.clone()),
                        env: scratch,
                        cut: body_cut,
                        spawner: Some(idx),
                        state: FrameState::Start,
                    };
                    self.frames[idx].call_mut().phase = CallPhase::AwaitBody;
                    self.frames.push(child);
                    self.pending = Pending::RunTop;
                    return false;
                }
            }
        }
    }

    /// Handle a child signal arriving at `idx`.
    fn deliver(&mut self, idx: usize, sig: Sig) -> bool {
        let kind = match &self.frames[idx].state {
            FrameState::CutScope => StateKind::CutScope,
            FrameState::Call(_) => StateKind::Call,
            FrameState::Start => StateKind::Start,
            FrameState::Yielded => StateKind::Yielded,
        };
        match (kind, sig) {
            (StateKind::CutScope, Sig::Yielded) => {
                let spawner = self.frames[idx].spawner;
                self.bubble(spawner, Sig::Yielded)
            }
            (StateKind::CutScope, Sig::Exhausted) => {
                // The rest of the continuation is exhausted: commit the
                // enclosing frame's clause choices.
                let cut = self.frames[idx].cut;
                self.flags.set(cut);
                let spawner = self.frames[idx].spawner;
                self.frames.pop();
                self.bubble(spawner, Sig::Exhausted)
            }
            (StateKind::Call, _) => match (self.frames[idx].call().phase, sig) {
                (CallPhase::AwaitBody, Sig::Yielded) => {
                    // The clause body succeeded: resolve the rest of the
                    // outer continuation on top of it.
                    let child = Frame {
                        cont: self.frames[idx].cont.tail(),
                        env: self.frames[idx].env,
                        cut: self.frames[idx].cut,
                        spawner: Some(idx),
                        state: FrameState::Start,
                    };
                    self.frames[idx].call_mut().phase = CallPhase::AwaitRest;
                    self.frames.push(child);
                    self.pending = Pending::RunTop;
                    false
                }
                (CallPhase::AwaitBody, Sig::Exhausted)
                | (CallPhase::AwaitRestNative, Sig::Exhausted) => {
                    // This clause attempt is spent: roll its bindings back
                    // and move to the next alternative.
                    let (mark, scratch) = {
                        let cf = self.frames[idx].call();
                        (cf.mark, cf.scratch)
                    };
                    self.trail.undo_to(mark, &mut self.envs);
                    self.envs.clear(scratch);
                    let cf = self.frames[idx].call_mut();
                    cf.next_clause += 1;
                    cf.phase = CallPhase::Dispatch;
                    self.pending = Pending::RunTop;
                    false
                }
                (CallPhase::AwaitRest, Sig::Yielded)
                | (CallPhase::AwaitRestNative, Sig::Yielded) => {
                    let spawner = self.frames[idx].spawner;
                    self.bubble(spawner, Sig::Yielded)
                }
                (CallPhase::AwaitRest, Sig::Exhausted) => {
                    // A cut that fired above this frame also commits the
                    // clause body being resolved beneath it.
                    if self.flags.get(self.frames[idx].cut) {
                        let body_cut = self.frames[idx].call().body_cut;
                        self.flags.set(body_cut);
                    }
                    self.frames[idx].call_mut().phase = CallPhase::AwaitBody;
                    // Resume the suspended body subtree.
                    self.pending = Pending::RunTop;
                    false
                }
                (CallPhase::Dispatch, _) => {
                    unreachable!("dispatching frames have no children")
                }
            },
            (StateKind::Start, _) | (StateKind::Yielded, _) => {
                unreachable!("leaf frames have no children")
            }
        }
    }

    /// A goal frame is out of alternatives: recycle its scratch
    /// environment and report exhaustion to its spawner.
    fn exhaust_call(&mut self, idx: usize) -> bool {
        debug_assert_eq!(idx, self.frames.len() - 1);
        let scratch = self.frames[idx].call().scratch;
        self.envs.release(scratch);
        let spawner = self.frames[idx].spawner;
        self.frames.pop();
        self.bubble(spawner, Sig::Exhausted)
    }

    /// Unify a goal against a candidate clause head, reporting the attempt
    /// when the process-wide unification trace is enabled. The left side is
    /// deep-resolved before the attempt so the report shows what the goal
    /// looked like going in.
    fn unify_head(&mut self, goal: TermId, env: EnvId, head: TermId, scratch: EnvId) -> bool {
        let engine = self.engine;
        let lhs = if unify::trace_enabled() {
            let resolved = self.envs.resolve_deep(goal, env, engine.terms());
            Some(engine.show(resolved).to_string())
        } else {
            None
        };
        let ok = unify(
            goal,
            env,
            head,
            scratch,
            &mut self.envs,
            &mut self.trail,
            scratch,
            engine.terms(),
        );
        if let Some(lhs) = lhs {
            let op = if ok { "~" } else { "!~" };
            eprintln!("\t{} {} {}", lhs, op, engine.show(head));
        }
        ok
    }
}

/// The restricted view a native callback receives: deep-resolved lookup and
/// unification, both scoped to the clause's environment and the current
/// attempt's trail.
pub struct CallbackEnv<'a> {
    engine: &'a Engine,
    envs: &'a mut EnvArena,
    trail: &'a mut Trail,
    env: EnvId,
}

impl CallbackEnv<'_> {
    /// Deep-resolve `term` in the clause's environment.
    pub fn get(&self, term: TermId) -> TermId {
        self.envs.resolve_deep(term, self.env, self.engine.terms())
    }

    /// Unify two terms in the clause's environment. Bindings that land in
    /// caller environments are trailed with the enclosing attempt and
    /// undone with it; clause-local bindings vanish with the environment.
    pub fn unify(&mut self, a: TermId, b: TermId) -> bool {
        unify(
            a,
            self.env,
            b,
            self.env,
            self.envs,
            self.trail,
            self.env,
            self.engine.terms(),
        )
    }

    /// Deep-resolve `term` and read it as an integer, if it is one.
    pub fn get_int(&self, term: TermId) -> Option<i64> {
        self.engine.terms().as_int(self.get(term))
    }

    /// Deep-resolve `term` and check whether it is still an unbound
    /// variable. Callbacks use this to assert their groundness
    /// preconditions.
    pub fn is_unbound(&self, term: TermId) -> bool {
        self.engine.terms().as_var(self.get(term)).is_some()
    }

    /// The engine, for building result terms inside callbacks.
    pub fn engine(&self) -> &Engine {
        self.engine
    }
}

impl std::fmt::Debug for CallbackEnv<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackEnv")
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "tests/solve.rs"]
mod tests;
