use interpreter::evaluate::{Evaluate, RuntimeErrorKind, Value, DEFAULT_MAX_DEPTH};
use interpreter::run::with_eval_stack;
use interpreter::lexer::{Lexer, TokenType};
use interpreter::{run_source, Error};
use std::io::Cursor;

type TestEvaluate = Evaluate<Vec<u8>, Cursor<Vec<u8>>>;

fn interpreter(input: &str, seed: u64) -> TestEvaluate {
    Evaluate::with_seed(Vec::new(), Cursor::new(input.as_bytes().to_vec()), seed)
}

// run code on a fresh interpreter and return the result with everything it wrote
fn run_with(code: &str, input: &str, seed: u64) -> (Result<Value, Error>, String) {
    let mut evaluate = interpreter(input, seed);
    let result = run_source(code, &mut evaluate);
    let output = String::from_utf8(evaluate.into_output()).expect("output is UTF-8");
    (result, output)
}

fn run(code: &str) -> (Result<Value, Error>, String) {
    run_with(code, "", 0)
}

fn output(code: &str) -> String {
    let (result, output) = run(code);
    if let Err(error) = result {
        panic!("program failed: {}\noutput so far:\n{}", error, output);
    }
    output
}

fn runtime_error(code: &str) -> (RuntimeErrorKind, String) {
    match run(code) {
        (Err(Error::Runtime(error)), output) => (error.kind, output),
        (other, _) => panic!("expected a runtime error, got {:?}", other),
    }
}

#[test]
fn tokenizes_an_assignment() {
    let kinds: Vec<TokenType> = Lexer::new("x = 3 + 4;")
        .tokens()
        .map(|item| item.map(|token| token.token_type))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        kinds,
        vec![
            TokenType::IDENTIFIER("x".to_string()),
            TokenType::ASSIGN,
            TokenType::NUMBER(3),
            TokenType::PLUS,
            TokenType::NUMBER(4),
            TokenType::SEMICOLON,
        ]
    );
}

#[test]
fn precedence() {
    assert_eq!(output("x = 3 + 4 * 2;\nwrite(x);"), "11\n");
    assert_eq!(output("x = (3 + 4) * 2;\nwrite(x);"), "14\n");
    assert_eq!(output("write(10 - 2 - 3);"), "5\n");
}

#[test]
fn floor_division() {
    assert_eq!(output("write(7/2);"), "3\n");
    assert_eq!(output("write((0 - 7)/2);"), "-4\n");
}

#[test]
fn division_by_zero_aborts_the_run() {
    let (kind, output) = runtime_error("write(1);\nwrite(7/0);\nwrite(2);");
    assert_eq!(kind, RuntimeErrorKind::DivisionByZero);
    assert_eq!(output, "1\n");
}

#[test]
fn block_function() {
    assert_eq!(
        output("function add(a, b): r = a + b; write(r); end\nadd(2,3);"),
        "5\n"
    );
}

#[test]
fn arity_mismatch_skips_the_body() {
    let (kind, output) =
        runtime_error("function add(a, b): write(\"called\"); end\nadd(2);");
    assert_eq!(
        kind,
        RuntimeErrorKind::ArityMismatch {
            name: "add".to_string(),
            expected: 2,
            found: 1,
        }
    );
    assert_eq!(output, "");
}

#[test]
fn expression_function_returns_its_value() {
    let code = "\
        function double(n), : n * 2;\n\
        function greet(), : \"hello\";\n\
        write(double(double(3)));\n\
        write(greet() <> \"!\");";
    assert_eq!(output(code), "12\nhello!\n");
}

#[test]
fn block_function_value_is_its_last_statement() {
    let code = "\
        function sum3(a, b, c):\n\
            s = a + b;\n\
            s = s + c;\n\
        end\n\
        write(sum3(1, 2, 3));";
    assert_eq!(output(code), "6\n");
}

#[test]
fn callee_does_not_see_or_touch_caller_variables() {
    let code = "\
        n = 10;\n\
        r = 0;\n\
        function f(n): r = n * 2; write(r); end\n\
        f(3);\n\
        write(n);\n\
        write(r);";
    assert_eq!(output(code), "6\n10\n0\n");

    let (kind, _) = runtime_error("secret = 1;\nfunction peek(), : secret;\nwrite(peek());");
    assert_eq!(kind, RuntimeErrorKind::UndefinedIdentifier("secret".to_string()));
}

#[test]
fn recursive_frames_are_independent() {
    // The inner definition replaces `fact` with its base case on the first
    // call, so the recursion bottoms out one level down.
    let code = "\
        n = 100;\n\
        function fact(n):\n\
            function fact(k), : k;\n\
            write(n);\n\
            r = n * fact(n - 1);\n\
        end\n\
        write(fact(3));\n\
        write(n);";
    assert_eq!(output(code), "3\n6\n100\n");
}

#[test]
fn unbounded_recursion_hits_the_depth_limit() {
    let mut evaluate = interpreter("", 0);
    evaluate.set_max_depth(4);
    let result = run_source(
        "n = 99;\nfunction down(n): write(n); down(n - 1); end\ndown(3);",
        &mut evaluate,
    );
    match result {
        Err(Error::Runtime(error)) => {
            assert_eq!(error.kind, RuntimeErrorKind::StackOverflow(4))
        }
        other => panic!("expected stack overflow, got {:?}", other),
    }
    assert_eq!(evaluate.globals().lookup("n"), Some(&Value::Int(99)));
    assert_eq!(evaluate.output(), b"3\n2\n1\n0\n");
}

#[test]
fn default_depth_limit_is_reached_without_exhausting_the_stack() {
    let kind = with_eval_stack(DEFAULT_MAX_DEPTH, || {
        let mut evaluate = interpreter("", 0);
        match run_source("function down(n): down(n - 1); end\ndown(0);", &mut evaluate) {
            Err(Error::Runtime(error)) => Some(error.kind),
            _ => None,
        }
    })
    .expect("spawn evaluation thread");
    assert_eq!(kind, Some(RuntimeErrorKind::StackOverflow(DEFAULT_MAX_DEPTH)));
}

#[test]
fn read_and_random_in_a_callee_bind_locally() {
    let code = "\
        n = 1;\n\
        r = 100;\n\
        function ask(): n = read(); end\n\
        function roll(): r = random(5); end\n\
        write(ask());\n\
        write(roll());\n\
        write(n);\n\
        write(r);";
    let mut evaluate = interpreter("typed\n", 3);
    run_source(code, &mut evaluate).unwrap();
    let written = String::from_utf8(evaluate.output().clone()).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "typed");
    let rolled: i64 = lines[1].parse().unwrap();
    assert!((0..=5).contains(&rolled), "random(5) gave {}", rolled);
    assert_eq!(&lines[2..], ["1", "100"]);
    assert_eq!(evaluate.globals().lookup("n"), Some(&Value::Int(1)));
    assert_eq!(evaluate.globals().lookup("r"), Some(&Value::Int(100)));
}

#[test]
fn string_interpolation() {
    assert_eq!(output("x = 5;\nwrite(\"val=#{x}\");"), "val=5\n");
    assert_eq!(output("write(\"val=#{y}\");"), "val=#y\n");
}

#[test]
fn interpolation_uses_the_active_environment() {
    let code = "\
        x = \"global\";\n\
        function show(x), : \"x is #{x}\";\n\
        write(show(1));\n\
        write(\"x is #{x}\");";
    assert_eq!(output(code), "x is 1\nx is global\n");
}

#[test]
fn lists() {
    assert_eq!(
        output("xs = [1, \"two\", [3, 4], []];\nwrite(xs);"),
        "[1, two, [3, 4], []]\n"
    );
}

#[test]
fn concat_and_comparisons() {
    assert_eq!(output("write(\"a\" <> 1 + 2);"), "a3\n");
    assert_eq!(output("write(2 /\\ 1);\nwrite(2 \\/ 1);"), "true\nfalse\n");
    assert_eq!(output("write(\"big? \" <> 5 /\\ 3);"), "big? true\n");
}

#[test]
fn unbound_identifier_is_an_error() {
    let (kind, _) = runtime_error("write(missing);");
    assert_eq!(kind, RuntimeErrorKind::UndefinedIdentifier("missing".to_string()));
}

#[test]
fn undefined_function_is_an_error() {
    let (kind, _) = runtime_error("nothing(1);");
    assert_eq!(kind, RuntimeErrorKind::UndefinedFunction("nothing".to_string()));
}

#[test]
fn functions_can_be_redefined() {
    let code = "\
        function f(), : 1;\n\
        write(f());\n\
        function f(), : 2;\n\
        write(f());";
    assert_eq!(output(code), "1\n2\n");
}

#[test]
fn read_consumes_lines_in_order() {
    let code = "\
        name = read();\n\
        age = read();\n\
        write(\"#{name} is #{age}\");";
    let (result, output) = run_with(code, "Ana\n30\n", 0);
    assert!(result.is_ok());
    assert_eq!(output, "Ana is 30\n");
}

#[test]
fn read_values_are_strings() {
    let (result, _) = run_with("n = read();\nwrite(n + 1);", "41\n", 0);
    match result {
        Err(Error::Runtime(error)) => assert!(matches!(
            error.kind,
            RuntimeErrorKind::TypeMismatch { operation: "+", .. }
        )),
        other => panic!("expected a type mismatch, got {:?}", other),
    }
}

#[test]
fn same_seed_and_input_give_same_output() {
    let code = "\
        a = random(1000);\n\
        b = random(1000);\n\
        c = read();\n\
        write([a, b, c]);";
    let first = run_with(code, "x\n", 1234);
    let second = run_with(code, "x\n", 1234);
    assert!(first.0.is_ok());
    assert_eq!(first, second);
}

#[test]
fn original_keywords_are_accepted() {
    let code = "\
        FUNCAO dobro(n): ESCREVER(n * 2); FIM\n\
        x = ALEATORIO(0);\n\
        dobro(x + 4);";
    assert_eq!(output(code), "8\n");
}

#[test]
fn comments_are_ignored() {
    let code = "\
        -- a line comment\n\
        x = 1; {- a block\n\
        comment -} write(x - 2);";
    assert_eq!(output(code), "-1\n");
}

#[test]
fn lexical_errors_stop_the_run_before_execution() {
    let (result, output) = run("write(1);\nx = 2 @ 3;\ny = 4 $;");
    match result {
        Err(Error::Lex(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected lexical errors, got {:?}", other),
    }
    assert_eq!(output, "");
}

#[test]
fn syntax_errors_stop_the_run_before_execution() {
    let (result, output) = run("write(1);\nwrite(2;");
    let error = result.unwrap_err();
    assert_eq!(error.exit_code(), 65);
    assert_eq!(error.to_string(), "[line 2] Error at ';': Expect ')' after value.");
    assert_eq!(output, "");
}

#[test]
fn runtime_errors_name_the_enclosing_statement() {
    let (result, _) = run("function f(a): x = a + missing; end\nf(1);");
    assert_eq!(
        result.unwrap_err().to_string(),
        "[line 1] Runtime Error: Undefined variable 'missing'. (in assignment to `x`)"
    );
}
