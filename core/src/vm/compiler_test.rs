#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::ast::{Block, Chunk, ExpList, Expr, FunctionBody, NameList, ParamList, Stmt};
    use crate::token::{Token, TokenDetail};
    use crate::vm::{CodegenError, CodegenOptions, Compiler, Op, State, compile_chunk, disassemble};

    fn closure_chunk(state: &mut State) -> Chunk {
        let module = state.intern("main");
        let x = state.intern("x");
        let f = state.intern("f");
        Chunk {
            module,
            block: Block::new(vec![
                Stmt::local(&[x], vec![Expr::number(1.0, 1)], 1),
                Stmt::LocalFunction {
                    name: TokenDetail::new(Token::Id(f), 2),
                    body: Box::new(FunctionBody {
                        params: ParamList::default(),
                        block: Block::with_return(vec![], vec![Expr::name(x, 3)], 3),
                        line: 2,
                    }),
                },
            ]),
        }
    }

    #[test]
    fn disassembly_lists_nested_functions() {
        let mut state = State::new();
        let chunk = closure_chunk(&mut state);
        let root = compile_chunk(&mut state, &chunk).expect("compile");

        let listing = disassemble(&state, root);
        assert!(listing.starts_with("function main <line 0> (0+ params"));
        assert!(listing.contains("CLOSURE    1 0"));
        assert!(listing.contains("  function f <line 2> (0 params"));
        assert!(listing.contains("GETUPVAL   0 0\t; x"));
        assert!(listing.contains("numbers (1):"));
        assert!(listing.contains("upvalues (1):"));
        assert!(listing.contains("x  register 0"));
    }

    #[test]
    fn json_export_has_the_whole_tree() {
        let mut state = State::new();
        let chunk = closure_chunk(&mut state);
        let root = compile_chunk(&mut state, &chunk).expect("compile");

        let json = state.export_json(root).expect("export");
        let value: Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["root"], json!(0));
        let strings = value["strings"].as_array().expect("strings");
        assert!(strings.contains(&json!("x")));
        assert!(strings.contains(&json!("self")));

        let functions = value["functions"].as_array().expect("functions");
        assert_eq!(functions.len(), 2);
        assert_eq!(functions[0]["superior"], Value::Null);
        assert_eq!(functions[1]["superior"], json!(0));
        assert_eq!(functions[0]["code"][0], json!({ "SetTop": 1 }));
        assert_eq!(functions[0]["const_numbers"], json!([1.0]));
        assert_eq!(functions[1]["upvalues"][0]["in_parent_stack"], json!(true));
    }

    #[test]
    fn generic_for_layout() {
        let mut state = State::new();
        let module = state.intern("iter");
        let [pairs, t, k, v] = ["pairs", "t", "k", "v"].map(|s| state.intern(s));
        let chunk = Chunk {
            module,
            block: Block::new(vec![Stmt::GenericFor {
                names: NameList::from_names(&[k, v], 1),
                exps: ExpList::new(vec![Expr::call(Expr::name(pairs, 1), vec![Expr::name(t, 1)], 1)]),
                block: Block::default(),
            }]),
        };
        let root = compile_chunk(&mut state, &chunk).expect("compile");
        let f = state.function(root);
        assert_eq!(
            f.code,
            vec![
                Op::SetTop(0),
                Op::GetGlobal(0, 0),
                Op::SetTop(1),
                Op::SetTop(1),
                Op::GetGlobal(1, 1),
                Op::SetTop(2),
                Op::Call(0),
                Op::SetTop(3),
                Op::Jmp(1),
                Op::SetTop(5),
                Op::SetTop(3),
                Op::TForCall { base: 0, nvars: 2 },
                Op::TForLoop { base: 0, ofs: -4 },
                Op::SetTop(0),
                Op::SetTop(0),
                Op::Ret(0),
            ]
        );
        assert_eq!(f.register_count(), 5);
    }

    #[test]
    fn generic_for_body_binds_from_the_fourth_slot() {
        let mut state = State::new();
        let module = state.intern("iter");
        let [pairs, t, k, v, w] = ["pairs", "t", "k", "v", "w"].map(|s| state.intern(s));
        let chunk = Chunk {
            module,
            block: Block::new(vec![Stmt::GenericFor {
                names: NameList::from_names(&[k, v], 1),
                exps: ExpList::new(vec![Expr::call(Expr::name(pairs, 1), vec![Expr::name(t, 1)], 1)]),
                block: Block::new(vec![Stmt::local(&[w], vec![Expr::name(v, 2)], 2), Stmt::Break { line: 3 }]),
            }]),
        };
        let root = compile_chunk(&mut state, &chunk).expect("compile");
        let f = state.function(root);
        assert_eq!(
            f.code[8..],
            [
                Op::Jmp(6),
                // local w = v
                Op::SetTop(6),
                Op::Move(6, 4),
                Op::Move(5, 6),
                Op::SetTop(6),
                // break
                Op::Jmp(4),
                Op::SetTop(5),
                Op::SetTop(3),
                Op::TForCall { base: 0, nvars: 2 },
                Op::TForLoop { base: 0, ofs: -9 },
                Op::SetTop(0),
                Op::SetTop(0),
                Op::Ret(0),
            ]
        );
    }

    #[test]
    fn constant_limit_aborts_compilation() {
        let mut state = State::new();
        let module = state.intern("consts");
        let a = state.intern("a");
        let chunk = Chunk {
            module,
            block: Block::new(vec![Stmt::local(
                &[a],
                vec![Expr::binary(Token::Add, Expr::number(1.0, 1), Expr::number(2.0, 1), 1)],
                1,
            )]),
        };
        let options = CodegenOptions::from_toml_str("max_constants = 1").expect("options");
        let err = Compiler::with_options(options)
            .compile_chunk(&mut state, &chunk)
            .expect_err("too many constants");
        assert_eq!(
            err.downcast_ref::<CodegenError>(),
            Some(&CodegenError::TooManyConstants { limit: 1 })
        );
    }

    #[test]
    fn one_state_holds_several_chunks() {
        let mut state = State::new();
        let first = closure_chunk(&mut state);
        let second = Chunk {
            module: state.intern("second"),
            block: Block::default(),
        };
        let compiler = Compiler::new();
        let a = compiler.compile_chunk(&mut state, &first).expect("first");
        let b = compiler.compile_chunk(&mut state, &second).expect("second");
        assert_ne!(a, b);
        assert_eq!(state.functions().len(), 3);
        assert_eq!(state.function(b).superior, None);
        assert_eq!(state.function(b).code, vec![Op::SetTop(0), Op::Ret(0)]);
    }
}
