use std::num::NonZeroU32;

use prog::module::{MAX_IDENT_ATTEMPTS, MAX_NESTING};
use prog::{
    BlockOwner, CondKind, Condition, Ident, IfStmt, Intrinsic, ModelError, Module, RepeatStmt,
    StmtKind,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn ident(s: &str) -> Ident {
    s.parse().expect("valid identifier")
}

fn attached(module: &mut Module, name: &str) -> prog::ProcId {
    let proc = module.create_procedure(ident(name)).unwrap();
    module.append_procedure(proc).unwrap();
    proc
}

#[test]
fn ident_validation() {
    assert!("ABCDEFGH".parse::<Ident>().is_ok());
    assert!("ABCDEFG".parse::<Ident>().is_err());
    assert!("ABCDEFGHI".parse::<Ident>().is_err());
    assert!("abcdefgh".parse::<Ident>().is_err());
    assert!("ABCD1FGH".parse::<Ident>().is_err());
    assert_eq!(ident("QWERTYUI").to_string(), "QWERTYUI");
}

#[test]
fn procedures_keep_insertion_order() {
    let mut module = Module::new();
    let a = attached(&mut module, "AAAAAAAA");
    let b = attached(&mut module, "BBBBBBBB");
    let c = attached(&mut module, "CCCCCCCC");

    assert_eq!(module.len(), 3);
    assert_eq!(module.first_procedure(), Some(a));
    assert_eq!(module.next_procedure(a), Some(b));
    assert_eq!(module.next_procedure(b), Some(c));
    assert_eq!(module.next_procedure(c), None);
    assert_eq!(module.last_procedure(), Some(c));
    assert_eq!(module.prev_procedure(c), Some(b));
    assert_eq!(module.prev_procedure(a), None);
    assert_eq!(module.procedures().collect::<Vec<_>>(), vec![a, b, c]);
}

#[test]
fn find_by_identifier() {
    let mut module = Module::new();
    let a = attached(&mut module, "AAAAAAAA");
    let b = attached(&mut module, "BBBBBBBB");
    assert_eq!(module.procedure_by_ident(ident("BBBBBBBB")), Some(b));
    assert_eq!(module.procedure_by_ident(ident("AAAAAAAA")), Some(a));
    assert_eq!(module.procedure_by_ident(ident("ZZZZZZZZ")), None);
}

#[test]
fn detached_procedure_is_not_found_until_appended() {
    let mut module = Module::new();
    let proc = module.create_procedure(ident("DRAFTDRA")).unwrap();
    assert!(!module.procedure(proc).unwrap().is_attached());
    assert_eq!(module.procedure_by_ident(ident("DRAFTDRA")), None);
    assert!(module.is_empty());

    module.append_procedure(proc).unwrap();
    assert_eq!(module.procedure_by_ident(ident("DRAFTDRA")), Some(proc));
    assert!(matches!(
        module.append_procedure(proc),
        Err(ModelError::AlreadyAttached(_))
    ));
}

#[test]
fn duplicate_identifier_rejected() {
    let mut module = Module::new();
    attached(&mut module, "AAAAAAAA");
    assert_eq!(
        module.create_procedure(ident("AAAAAAAA")),
        Err(ModelError::DuplicateIdent(ident("AAAAAAAA")))
    );
}

#[test]
fn statements_link_back_to_their_block() {
    let mut module = Module::new();
    let proc = attached(&mut module, "AAAAAAAA");
    let body = module.procedure(proc).unwrap().body();

    let s1 = module.create_intrinsic(Intrinsic::Move);
    let s2 = module.create_intrinsic(Intrinsic::TurnLeft);
    let s3 = module.create_intrinsic(Intrinsic::PickUp);
    for s in [s1, s2, s3] {
        assert_eq!(module.statement(s).unwrap().block(), None);
        module.append_statement(body, s).unwrap();
        assert_eq!(module.statement(s).unwrap().block(), Some(body));
    }

    assert_eq!(module.block(body).unwrap().owner(), Some(BlockOwner::Procedure(proc)));
    assert_eq!(module.first_statement(body), Some(s1));
    assert_eq!(module.next_statement(s1), Some(s2));
    assert_eq!(module.next_statement(s3), None);
    assert_eq!(module.last_statement(body), Some(s3));
    assert_eq!(module.prev_statement(s2), Some(s1));
    assert_eq!(module.prev_statement(s1), None);

    assert_eq!(
        module.append_statement(body, s1),
        Err(ModelError::StatementAttached)
    );
}

#[test]
fn call_requires_attached_target() {
    let mut module = Module::new();
    let draft = module.create_procedure(ident("DRAFTDRA")).unwrap();
    assert!(matches!(
        module.create_call(draft),
        Err(ModelError::DetachedTarget(_))
    ));
    module.append_procedure(draft).unwrap();
    assert!(module.create_call(draft).is_ok());
}

#[test]
fn nested_blocks_are_adopted() {
    let mut module = Module::new();
    let on_true = module.create_block();
    let on_false = module.create_block();
    let stmt = module
        .create_statement(StmtKind::If(IfStmt {
            cond: Condition::new(CondKind::Wall),
            on_true,
            on_false: Some(on_false),
        }))
        .unwrap();

    assert_eq!(module.block(on_true).unwrap().owner(), Some(BlockOwner::Statement(stmt)));
    assert_eq!(module.block(on_false).unwrap().owner(), Some(BlockOwner::Statement(stmt)));

    // An adopted block cannot be handed to a second statement.
    let result = module.create_statement(StmtKind::Repeat(RepeatStmt {
        count: NonZeroU32::new(2),
        start: None,
        body: on_true,
        end: None,
    }));
    assert_eq!(result, Err(ModelError::BlockAttached));
    assert_eq!(module.destroy_block(on_true), Err(ModelError::BlockAttached));
}

#[test]
fn statement_cannot_be_appended_inside_itself() {
    let mut module = Module::new();
    let body = module.create_block();
    let repeat = module
        .create_statement(StmtKind::Repeat(RepeatStmt {
            count: None,
            start: Some(Condition::not(CondKind::Wall)),
            body,
            end: None,
        }))
        .unwrap();
    assert_eq!(module.append_statement(body, repeat), Err(ModelError::Cycle));
}

#[test]
fn destroy_cascades_and_is_idempotent() {
    let mut module = Module::new();
    let inner = module.create_block();
    let step = module.create_intrinsic(Intrinsic::Move);
    module.append_statement(inner, step).unwrap();
    let repeat = module
        .create_statement(StmtKind::Repeat(RepeatStmt {
            count: NonZeroU32::new(3),
            start: None,
            body: inner,
            end: None,
        }))
        .unwrap();

    module.destroy_statement(repeat).unwrap();
    assert!(module.statement(repeat).is_none());
    assert!(module.block(inner).is_none());
    assert!(module.statement(step).is_none());
    assert_eq!(module.destroy_statement(repeat), Ok(()));
}

#[test]
fn destroy_procedure_refuses_while_called() {
    let mut module = Module::new();
    let main = attached(&mut module, "MAINMAIN");
    let helper = attached(&mut module, "HELPERHE");
    let main_body = module.procedure(main).unwrap().body();
    let call = module.create_call(helper).unwrap();
    module.append_statement(main_body, call).unwrap();

    assert_eq!(
        module.destroy_procedure(helper),
        Err(ModelError::ProcedureInUse(ident("HELPERHE")))
    );

    // Self-recursion does not keep a procedure alive.
    let helper_body = module.procedure(helper).unwrap().body();
    let recursive = module.create_call(main).unwrap();
    module.append_statement(helper_body, recursive).unwrap();
    let self_call = module.create_call(main).unwrap();
    module.append_statement(main_body, self_call).unwrap();
    assert!(module.destroy_procedure(main).is_err());
}

#[test]
fn destroy_self_recursive_procedure() {
    let mut module = Module::new();
    let loopy = attached(&mut module, "LOOPLOOP");
    let body = module.procedure(loopy).unwrap().body();
    let call = module.create_call(loopy).unwrap();
    module.append_statement(body, call).unwrap();

    module.destroy_procedure(loopy).unwrap();
    assert!(module.is_empty());
    assert!(module.statement(call).is_none());
    assert_eq!(module.destroy_procedure(loopy), Ok(()));
}

#[test]
fn linear_index_walks_nested_blocks_in_preorder() {
    let mut module = Module::new();
    let proc = attached(&mut module, "AAAAAAAA");
    let body = module.procedure(proc).unwrap().body();

    let first = module.create_intrinsic(Intrinsic::Move);
    module.append_statement(body, first).unwrap();

    let on_true = module.create_block();
    let nested = module.create_intrinsic(Intrinsic::PutBlack);
    module.append_statement(on_true, nested).unwrap();
    let branch = module
        .create_statement(StmtKind::If(IfStmt {
            cond: Condition::new(CondKind::AnyTag),
            on_true,
            on_false: None,
        }))
        .unwrap();
    module.append_statement(body, branch).unwrap();

    let last = module.create_intrinsic(Intrinsic::TurnLeft);
    module.append_statement(body, last).unwrap();

    assert_eq!(
        module.linear_statements(proc).unwrap(),
        vec![first, branch, nested, last]
    );
    assert_eq!(module.stmt_index(proc, nested), Some(2));
    assert_eq!(module.stmt_index(proc, last), Some(3));
    assert_eq!(module.stmt_by_index(proc, 1), Some(branch));
    assert_eq!(module.stmt_by_index(proc, 4), None);
}

#[test]
fn generated_identifiers_are_unique() {
    let mut module = Module::new();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let ident = module.generate_ident_with(&mut rng).unwrap();
        let proc = module.create_procedure(ident).unwrap();
        module.append_procedure(proc).unwrap();
    }
    assert_eq!(module.len(), 500);
}

#[test]
fn identifier_collision_is_retried() {
    let mut module = Module::new();
    let first = module
        .generate_ident_with(&mut StdRng::seed_from_u64(42))
        .unwrap();
    let proc = module.create_procedure(first).unwrap();
    module.append_procedure(proc).unwrap();

    // Same seed: the first draw collides and must be discarded.
    let second = module
        .generate_ident_with(&mut StdRng::seed_from_u64(42))
        .unwrap();
    assert_ne!(first, second);
}

#[test]
fn identifier_generation_gives_up_eventually() {
    struct Stuck;
    impl rand::RngCore for Stuck {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            dest.fill(0);
            Ok(())
        }
    }

    let mut module = Module::new();
    let ident = module.generate_ident_with(&mut Stuck).unwrap();
    let proc = module.create_procedure(ident).unwrap();
    module.append_procedure(proc).unwrap();

    assert_eq!(
        module.generate_ident_with(&mut Stuck),
        Err(ModelError::IdentSpaceExhausted {
            attempts: MAX_IDENT_ATTEMPTS
        })
    );
}

fn counted_repeat(module: &mut Module, body: prog::BlockId) -> Result<prog::StmtId, ModelError> {
    module.create_statement(StmtKind::Repeat(RepeatStmt {
        count: NonZeroU32::new(2),
        start: None,
        body,
        end: None,
    }))
}

#[test]
fn nesting_limit_applies_when_appending() {
    let mut module = Module::new();
    let proc = attached(&mut module, "AAAAAAAA");
    let mut block = module.procedure(proc).unwrap().body();
    for _ in 0..MAX_NESTING {
        let body = module.create_block();
        let repeat = counted_repeat(&mut module, body).unwrap();
        module.append_statement(block, repeat).unwrap();
        block = body;
    }
    let mv = module.create_intrinsic(Intrinsic::Move);
    module.append_statement(block, mv).unwrap();

    let body = module.create_block();
    let repeat = counted_repeat(&mut module, body).unwrap();
    assert_eq!(
        module.append_statement(block, repeat),
        Err(ModelError::NestingTooDeep { limit: MAX_NESTING })
    );
}

/// A detached statement made of `height` repeats nested inside each other.
fn tower(module: &mut Module, height: usize) -> prog::StmtId {
    let mut body = module.create_block();
    let mut top = counted_repeat(module, body).unwrap();
    for _ in 1..height {
        body = module.create_block();
        module.append_statement(body, top).unwrap();
        top = counted_repeat(module, body).unwrap();
    }
    top
}

#[test]
fn nesting_limit_applies_when_adopting() {
    let mut module = Module::new();
    let top = tower(&mut module, MAX_NESTING);
    let wrapper = module.create_block();
    module.append_statement(wrapper, top).unwrap();
    assert_eq!(
        counted_repeat(&mut module, wrapper),
        Err(ModelError::NestingTooDeep { limit: MAX_NESTING })
    );
}

#[test]
fn full_height_subtree_fits_only_at_top_level() {
    let mut module = Module::new();
    let proc = attached(&mut module, "AAAAAAAA");
    let proc_body = module.procedure(proc).unwrap().body();
    let outer_body = module.create_block();
    let outer = counted_repeat(&mut module, outer_body).unwrap();
    module.append_statement(proc_body, outer).unwrap();

    let top = tower(&mut module, MAX_NESTING);
    assert_eq!(
        module.append_statement(outer_body, top),
        Err(ModelError::NestingTooDeep { limit: MAX_NESTING })
    );
    module.append_statement(proc_body, top).unwrap();
}
