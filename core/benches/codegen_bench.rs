use criterion::{Criterion, criterion_group, criterion_main};
use luna_core::{
    ast::{Block, Chunk, Expr, FunctionBody, NameList, ParamList, Stmt},
    token::{Token, TokenDetail},
    vm::{State, compile_chunk},
};
use std::hint::black_box;

// local v0 = 0; local v1 = v0 + 1; ... inside `function f(p0..pN)`, called once per local.
fn build_chunk(state: &mut State, n_params: usize, n_locals: usize) -> Chunk {
    let params: Vec<_> = (0..n_params).map(|i| state.intern(&format!("p{i}"))).collect();
    let locals: Vec<_> = (0..n_locals).map(|i| state.intern(&format!("v{i}"))).collect();
    let f = state.intern("f");

    let mut stmts = Vec::with_capacity(n_locals);
    for (i, &local) in locals.iter().enumerate() {
        let init = match i {
            0 => Expr::number(0.0, 1),
            _ => Expr::binary(
                Token::Add,
                Expr::name(locals[i - 1], 1),
                Expr::name(params[i % params.len().max(1)], 1),
                1,
            ),
        };
        stmts.push(Stmt::local(&[local], vec![init], 1));
    }
    let body = Block::with_return(stmts, vec![Expr::name(locals[n_locals - 1], 1)], 1);

    let mut chunk_stmts = vec![Stmt::LocalFunction {
        name: TokenDetail::new(Token::Id(f), 1),
        body: Box::new(FunctionBody {
            params: ParamList {
                names: Some(NameList::from_names(&params, 1)),
                vararg: false,
            },
            block: body,
            line: 1,
        }),
    }];
    for _ in 0..n_locals {
        let args = params.iter().map(|_| Expr::number(1.0, 2)).collect();
        chunk_stmts.push(Stmt::Call(Expr::call(Expr::name(f, 2), args, 2)));
    }

    Chunk {
        module: state.intern("bench"),
        block: Block::new(chunk_stmts),
    }
}

fn bench_compile(c: &mut Criterion) {
    let mut template = State::new();
    let chunk = build_chunk(&mut template, 8, 64);

    c.bench_function("codegen_chunk", |b| {
        b.iter(|| {
            // A fresh pool per iteration keeps the function list from growing.
            let mut state = template.clone();
            let root = compile_chunk(&mut state, black_box(&chunk)).unwrap();
            black_box(root)
        })
    });
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
