use super::*;

#[test]
fn test_calling_functions_without_arguments() {
    let cases = [
        ("let fivePlusTen = fn() { 5 + 10; }; fivePlusTen();", 15),
        ("let one = fn() { 1; }; let two = fn() { 2; }; one() + two()", 3),
        (
            "let a = fn() { 1 }; let b = fn() { a() + 1 }; let c = fn() { b() + 1 }; c();",
            3,
        ),
    ];
    for (input, expected) in cases {
        assert_eq!(run_ok(input), Val::Int(expected), "source: {input}");
    }
}

#[test]
fn test_functions_with_return_statement() {
    let cases = [
        ("let earlyExit = fn() { return 99; 100; }; earlyExit();", 99),
        ("let earlyExit = fn() { return 99; return 100; }; earlyExit();", 99),
    ];
    for (input, expected) in cases {
        assert_eq!(run_ok(input), Val::Int(expected), "source: {input}");
    }
}

#[test]
fn test_functions_without_return_value() {
    let cases = [
        "let noReturn = fn() { }; noReturn();",
        "let noReturn = fn() { }; let noReturnTwo = fn() { noReturn(); }; noReturn(); noReturnTwo();",
    ];
    for input in cases {
        assert_eq!(run_ok(input), Val::Null, "source: {input}");
    }
}

#[test]
fn test_first_class_functions() {
    assert_eq!(
        run_ok(
            "let returnsOne = fn() { 1; }; \
             let returnsOneReturner = fn() { returnsOne; }; \
             returnsOneReturner()();"
        ),
        Val::Int(1)
    );
}

#[test]
fn test_calling_functions_with_bindings() {
    let cases = [
        ("let one = fn() { let one = 1; one }; one();", 1),
        (
            "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; oneAndTwo();",
            3,
        ),
        (
            "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; \
             let threeAndFour = fn() { let three = 3; let four = 4; three + four; }; \
             oneAndTwo() + threeAndFour();",
            10,
        ),
        // Sibling frames get independent local slots.
        (
            "let firstFoobar = fn() { let foobar = 50; foobar; }; \
             let secondFoobar = fn() { let foobar = 100; foobar; }; \
             firstFoobar() + secondFoobar();",
            150,
        ),
        (
            "let globalSeed = 50; \
             let minusOne = fn() { let num = 1; globalSeed - num; }; \
             let minusTwo = fn() { let num = 2; globalSeed - num; }; \
             minusOne() + minusTwo();",
            97,
        ),
    ];
    for (input, expected) in cases {
        assert_eq!(run_ok(input), Val::Int(expected), "source: {input}");
    }
}

#[test]
fn test_calling_functions_with_arguments() {
    let cases = [
        ("let identity = fn(a) { a; }; identity(4);", 4),
        ("let sum = fn(a, b) { a + b; }; sum(1, 2);", 3),
        ("let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2);", 3),
        (
            "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2) + sum(3, 4);",
            10,
        ),
        (
            "let sum = fn(a, b) { let c = a + b; c; }; \
             let outer = fn() { sum(1, 2) + sum(3, 4); }; outer();",
            10,
        ),
        (
            "let globalNum = 10; \
             let sum = fn(a, b) { let c = a + b; c + globalNum; }; \
             let outer = fn() { sum(1, 2) + sum(3, 4) + globalNum; }; \
             outer() + globalNum;",
            50,
        ),
    ];
    for (input, expected) in cases {
        assert_eq!(run_ok(input), Val::Int(expected), "source: {input}");
    }
}

#[test]
fn test_calling_functions_with_wrong_arguments() {
    let cases = [
        ("fn() { 1; }(1);", "wrong number of arguments: want=0, got=1"),
        ("fn(a) { a; }();", "wrong number of arguments: want=1, got=0"),
        (
            "fn(a, b) { a + b; }(1);",
            "wrong number of arguments: want=2, got=1",
        ),
    ];
    for (input, expected) in cases {
        assert_eq!(run_err(input), expected, "source: {input}");
    }
}

#[test]
fn test_calling_non_functions() {
    assert_eq!(
        run_err("let one = 1; one();"),
        "calling non-closure and non-builtin"
    );
    assert_eq!(run_err("5();"), "calling non-closure and non-builtin");
}

#[test]
fn test_closures() {
    let cases = [
        (
            "let newClosure = fn(a) { fn() { a; }; }; \
             let closure = newClosure(99); closure();",
            99,
        ),
        (
            "let newAdder = fn(a, b) { fn(c) { a + b + c } }; \
             let adder = newAdder(1, 2); adder(8);",
            11,
        ),
        (
            "let newAdder = fn(a, b) { let c = a + b; fn(d) { c + d }; }; \
             let adder = newAdder(1, 2); adder(8);",
            11,
        ),
        (
            "let newAdderOuter = fn(a, b) { let c = a + b; \
               fn(d) { let e = d + c; fn(f) { e + f; }; }; }; \
             let newAdderInner = newAdderOuter(1, 2); \
             let adder = newAdderInner(3); adder(8);",
            14,
        ),
        (
            "let a = 1; \
             let newAdderOuter = fn(b) { fn(c) { fn(d) { a + b + c + d }; }; }; \
             let newAdderInner = newAdderOuter(2); \
             let adder = newAdderInner(3); adder(8);",
            14,
        ),
        (
            "let newClosure = fn(a, b) { \
               let one = fn() { a; }; let two = fn() { b; }; \
               fn() { one() + two(); }; }; \
             let closure = newClosure(9, 90); closure();",
            99,
        ),
    ];
    for (input, expected) in cases {
        assert_eq!(run_ok(input), Val::Int(expected), "source: {input}");
    }
}

#[test]
fn test_recursive_functions() {
    let cases = [
        (
            "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } }; \
             countDown(1);",
            0,
        ),
        (
            "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } }; \
             countDown(3);",
            0,
        ),
        // The self-reference resolves through the current frame's closure,
        // so it keeps working when the definition is itself a local.
        (
            "let wrapper = fn() { \
               let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } }; \
               countDown(1); }; \
             wrapper();",
            0,
        ),
    ];
    for (input, expected) in cases {
        assert_eq!(run_ok(input), Val::Int(expected), "source: {input}");
    }
}

#[test]
fn test_recursive_fibonacci() {
    assert_eq!(
        run_ok(
            "let fibonacci = fn(x) { \
               if (x == 0) { return 0; } else { \
                 if (x == 1) { return 1; } else { \
                   fibonacci(x - 1) + fibonacci(x - 2); } } }; \
             fibonacci(15);"
        ),
        Val::Int(610)
    );
}

#[test]
fn test_return_at_top_level_is_a_flat_error() {
    assert_eq!(run_err("return 5;"), "return outside of function");
}

#[test]
fn test_unbounded_recursion_overflows_frames() {
    assert_eq!(
        run_err("let go = fn() { go(); }; go();"),
        "frame overflow"
    );
}

#[test]
fn test_deep_recursion_with_locals_overflows_stack() {
    // Four argument slots per frame exhaust the operand stack before the
    // frame stack fills up.
    assert_eq!(
        run_err("let go = fn(a, b, c, d) { go(a, b, c, d); }; go(1, 2, 3, 4);"),
        "stack overflow"
    );
}
