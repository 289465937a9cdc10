use crate::env::{Binding, EnvArena, EnvId};
use crate::term::{Term, TermId, TermStore};
use crate::trail::Trail;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "tracing")]
use crate::trace::trace;

/// Process-wide unification trace flag. Default off; diagnostic only.
static TRACE_UNIFY: AtomicBool = AtomicBool::new(false);

/// When enabled, every head-unification attempt reports its left/right
/// values and outcome on stderr. Affects no semantics.
pub fn set_trace(enabled: bool) {
    TRACE_UNIFY.store(enabled, Ordering::Relaxed);
}

/// Check whether the unification trace is enabled.
pub fn trace_enabled() -> bool {
    TRACE_UNIFY.load(Ordering::Relaxed)
}

/// Unify `x` under `x_env` with `y` under `y_env`.
///
/// Bindings made along the way are recorded on `trail` so a failed or
/// exhausted attempt can be rolled back, except bindings into `scratch`:
/// that environment is discarded wholesale by clearing it, so trailing its
/// entries would be wasted work.
///
/// Returns false for the ordinary "no" outcome; this is never an error.
/// No occurs-check is performed, so cyclic terms can be constructed.
#[allow(clippy::too_many_arguments)]
pub fn unify(
    x: TermId,
    x_env: EnvId,
    y: TermId,
    y_env: EnvId,
    envs: &mut EnvArena,
    trail: &mut Trail,
    scratch: EnvId,
    terms: &TermStore,
) -> bool {
    let (mut x, mut x_env, mut y, mut y_env) = (x, x_env, y, y_env);

    // Normalize so that "bind the variable" always happens on the x side.
    loop {
        if let Some(var) = terms.as_var(x) {
            match envs.lookup(x_env, var) {
                None => {
                    // x is unbound: bind it to the dereferenced y side.
                    let (yt, ye) = envs.dereference(y, y_env, terms);
                    // Binding a variable to itself in its own environment
                    // would create a trivial cycle; treat it as a no-op
                    // success instead.
                    let self_binding = terms.as_var(yt) == Some(var) && ye == x_env;
                    if !self_binding {
                        envs.bind(x_env, var, Binding { term: yt, env: ye });
                        if x_env != scratch {
                            trail.push(var, x_env);
                        }
                    }
                    #[cfg(feature = "tracing")]
                    trace!(var = var.raw(), env = x_env.raw(), "unify_bind");
                    return true;
                }
                Some(binding) => {
                    // x is bound: chase the binding and keep going.
                    let (t, e) = envs.dereference(binding.term, binding.env, terms);
                    x = t;
                    x_env = e;
                }
            }
        } else if terms.as_var(y).is_some() {
            std::mem::swap(&mut x, &mut y);
            std::mem::swap(&mut x_env, &mut y_env);
        } else {
            break;
        }
    }

    // Both sides are dereferenced non-variables now.
    match (terms.resolve(x), terms.resolve(y)) {
        (Some(Term::Goal(xp, xargs)), Some(Term::Goal(yp, yargs))) => {
            // Goals unify only under the identical predicate.
            if xp != yp {
                #[cfg(feature = "tracing")]
                trace!("unify_pred_mismatch");
                return false;
            }
            unify_elements(&xargs, x_env, &yargs, y_env, envs, trail, scratch, terms)
        }
        (Some(Term::Tuple(xs)), Some(Term::Tuple(ys))) => {
            unify_elements(&xs, x_env, &ys, y_env, envs, trail, scratch, terms)
        }
        (Some(Term::Atom(a)), Some(Term::Atom(b))) => a == b,
        _ => false,
    }
}

/// Unify two argument sequences element-wise, failing on length mismatch or
/// on the first element that does not unify.
#[allow(clippy::too_many_arguments)]
fn unify_elements(
    xs: &[TermId],
    x_env: EnvId,
    ys: &[TermId],
    y_env: EnvId,
    envs: &mut EnvArena,
    trail: &mut Trail,
    scratch: EnvId,
    terms: &TermStore,
) -> bool {
    if xs.len() != ys.len() {
        #[cfg(feature = "tracing")]
        trace!(lhs = xs.len(), rhs = ys.len(), "unify_arity_mismatch");
        return false;
    }
    for (&a, &b) in xs.iter().zip(ys.iter()) {
        if !unify(a, x_env, b, y_env, envs, trail, scratch, terms) {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[path = "tests/unify.rs"]
mod tests;
