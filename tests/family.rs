//! Family-relationship rule set, built purely on the public construction
//! API: facts for `male`/`female`/`parent`, derived relations on top.

use sldlog::api::Engine;
use sldlog::db::{BodyItem, PredId};
use sldlog::term::TermId;

struct Family {
    engine: Engine,
    male: PredId,
    female: PredId,
    parent: PredId,
    child: PredId,
    father: PredId,
    mother: PredId,
    son: PredId,
    daughter: PredId,
    brother: PredId,
    sister: PredId,
}

/// Declare the derived relations:
///
/// child(A, B)    << parent(B, A)
/// father(A, B)   << parent(A, B), male(A)
/// mother(A, B)   << parent(A, B), female(A)
/// son(A, B)      << child(A, B), male(A)
/// daughter(A, B) << child(A, B), female(A)
/// brother(A, B)  << child(A, X), child(B, X), male(A)
/// sister(A, B)   << child(A, X), child(B, X), female(A)
fn family_rules() -> Family {
    let mut engine = Engine::new();
    let male = engine.pred("male");
    let female = engine.pred("female");
    let parent = engine.pred("parent");
    let child = engine.pred("child");
    let father = engine.pred("father");
    let mother = engine.pred("mother");
    let son = engine.pred("son");
    let daughter = engine.pred("daughter");
    let brother = engine.pred("brother");
    let sister = engine.pred("sister");

    let a = engine.var("A");
    let b = engine.var("B");
    let x = engine.var("X");

    let head = engine.goal(child, &[a, b]);
    let body = engine.goal(parent, &[b, a]);
    engine.define(head, &[body.into()]).unwrap();

    for (rel, gender) in [(father, male), (mother, female)] {
        let head = engine.goal(rel, &[a, b]);
        let b1 = engine.goal(parent, &[a, b]);
        let b2 = engine.goal(gender, &[a]);
        engine.define(head, &[b1.into(), b2.into()]).unwrap();
    }

    for (rel, gender) in [(son, male), (daughter, female)] {
        let head = engine.goal(rel, &[a, b]);
        let b1 = engine.goal(child, &[a, b]);
        let b2 = engine.goal(gender, &[a]);
        engine.define(head, &[b1.into(), b2.into()]).unwrap();
    }

    for (rel, gender) in [(brother, male), (sister, female)] {
        let head = engine.goal(rel, &[a, b]);
        let b1 = engine.goal(child, &[a, x]);
        let b2 = engine.goal(child, &[b, x]);
        let b3 = engine.goal(gender, &[a]);
        engine
            .define(head, &[b1.into(), b2.into(), b3.into()])
            .unwrap();
    }

    Family {
        engine,
        male,
        female,
        parent,
        child,
        father,
        mother,
        son,
        daughter,
        brother,
        sister,
    }
}

fn fact(engine: &mut Engine, pred: PredId, args: &[TermId]) {
    let head = engine.goal(pred, args);
    engine.define(head, &[]).unwrap();
}

fn all(engine: &Engine, goals: &[BodyItem], watch: TermId) -> Vec<TermId> {
    let mut out = Vec::new();
    let mut solutions = engine.resolve(goals).expect("valid query");
    while let Some(solution) = solutions.next_solution() {
        out.push(solution.get(watch));
    }
    out
}

/// The scenario from the engine's acceptance checklist: `a` is male but not
/// anyone's child, so `son(a, Z)` has no answers; `son(c, a)` holds once
/// `male(c)` is asserted.
#[test]
fn son_queries_over_small_fact_set() {
    let mut family = family_rules();
    let (ea, eb, ec, ed) = {
        let e = &family.engine;
        (e.sym("a"), e.sym("b"), e.sym("c"), e.sym("d"))
    };
    fact(&mut family.engine, family.male, &[ea]);
    fact(&mut family.engine, family.female, &[eb]);
    fact(&mut family.engine, family.parent, &[ea, ec]);
    fact(&mut family.engine, family.parent, &[ea, ed]);
    fact(&mut family.engine, family.male, &[ec]);

    let engine = &mut family.engine;
    let z = engine.var("Z");
    let query = engine.goal(family.son, &[ea, z]);
    assert!(all(engine, &[query.into()], z).is_empty());

    let query = engine.goal(family.son, &[ec, ea]);
    assert_eq!(all(engine, &[query.into()], query).len(), 1);
}

#[test]
fn derived_relations_enumerate_in_fact_order() {
    let mut family = family_rules();
    let (kiyoaki, chieko, yuki, ai, norifumi) = {
        let e = &family.engine;
        (
            e.sym("kiyoaki"),
            e.sym("chieko"),
            e.sym("yuki"),
            e.sym("ai"),
            e.sym("norifumi"),
        )
    };
    fact(&mut family.engine, family.male, &[kiyoaki]);
    fact(&mut family.engine, family.female, &[chieko]);
    fact(&mut family.engine, family.female, &[yuki]);
    fact(&mut family.engine, family.female, &[ai]);
    fact(&mut family.engine, family.male, &[norifumi]);
    for p in [kiyoaki, chieko] {
        for c in [yuki, ai, norifumi] {
            fact(&mut family.engine, family.parent, &[p, c]);
        }
    }

    let engine = &mut family.engine;

    // child(yuki, P) lists both parents, in fact order.
    let p = engine.var("P");
    let query = engine.goal(family.child, &[yuki, p]);
    assert_eq!(all(engine, &[query.into()], p), vec![kiyoaki, chieko]);

    // father(kiyoaki, C) enumerates children in fact order.
    let c = engine.var("C");
    let query = engine.goal(family.father, &[kiyoaki, c]);
    assert_eq!(all(engine, &[query.into()], c), vec![yuki, ai, norifumi]);

    // mother(M, ai) finds chieko only.
    let m = engine.var("M");
    let query = engine.goal(family.mother, &[m, ai]);
    assert_eq!(all(engine, &[query.into()], m), vec![chieko]);

    // daughter(D, chieko) skips norifumi.
    let d = engine.var("D");
    let query = engine.goal(family.daughter, &[d, chieko]);
    assert_eq!(all(engine, &[query.into()], d), vec![yuki, ai]);

    // brother(norifumi, B): one brother relation per shared parent and
    // sibling, in clause order; norifumi counts as his own sibling.
    let b = engine.var("B");
    let query = engine.goal(family.brother, &[norifumi, b]);
    let got = all(engine, &[query.into()], b);
    assert_eq!(got, vec![yuki, ai, norifumi, yuki, ai, norifumi]);

    // sister(yuki, ai) holds through either shared parent.
    let query = engine.goal(family.sister, &[yuki, ai]);
    assert_eq!(all(engine, &[query.into()], query).len(), 2);
}

#[test]
fn conjunction_query_combines_relations() {
    let mut family = family_rules();
    let (p1, c1) = {
        let e = &family.engine;
        (e.sym("pat"), e.sym("kim"))
    };
    fact(&mut family.engine, family.male, &[p1]);
    fact(&mut family.engine, family.male, &[c1]);
    fact(&mut family.engine, family.parent, &[p1, c1]);

    let engine = &mut family.engine;
    let f = engine.var("F");
    let s = engine.var("S");
    let g1 = engine.goal(family.father, &[f, s]);
    let g2 = engine.goal(family.son, &[s, f]);
    let pair = engine.pair(f, s);
    assert_eq!(
        all(engine, &[g1.into(), g2.into()], pair),
        vec![engine.pair(p1, c1)]
    );
}

#[test]
fn query_driver_reports_counts() {
    let mut family = family_rules();
    let (p1, c1) = {
        let e = &family.engine;
        (e.sym("pat"), e.sym("kim"))
    };
    fact(&mut family.engine, family.female, &[p1]);
    fact(&mut family.engine, family.female, &[c1]);
    fact(&mut family.engine, family.parent, &[p1, c1]);

    let engine = &mut family.engine;
    let m = engine.var("M");
    let query = engine.goal(family.mother, &[m, c1]);
    assert_eq!(engine.query(&[query.into()]), Ok(1));

    let query = engine.goal(family.father, &[m, c1]);
    assert_eq!(engine.query(&[query.into()]), Ok(0));
}
