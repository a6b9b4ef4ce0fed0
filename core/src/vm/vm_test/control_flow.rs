use super::*;

#[test]
fn test_conditionals() {
    let cases = [
        ("if (true) { 10 }", Val::Int(10)),
        ("if (true) { 10 } else { 20 }", Val::Int(10)),
        ("if (false) { 10 } else { 20 }", Val::Int(20)),
        ("if (1) { 10 }", Val::Int(10)),
        ("if (1 < 2) { 10 }", Val::Int(10)),
        ("if (1 < 2) { 10 } else { 20 }", Val::Int(10)),
        ("if (1 > 2) { 10 } else { 20 }", Val::Int(20)),
        // A missing alternative evaluates to null when the condition
        // fails.
        ("if (1 > 2) { 10 }", Val::Null),
        ("if (false) { 10 }", Val::Null),
        ("if ((if (false) { 10 })) { 10 } else { 20 }", Val::Int(20)),
    ];
    for (input, expected) in cases {
        assert_eq!(run_ok(input), expected, "source: {input}");
    }
}

#[test]
fn test_truthiness_edges() {
    // Zero and the empty string are truthy; only false and null are not.
    let cases = [
        ("if (0) { 1 } else { 2 }", Val::Int(1)),
        ("if (\"\") { 1 } else { 2 }", Val::Int(1)),
        ("if ([]) { 1 } else { 2 }", Val::Int(1)),
    ];
    for (input, expected) in cases {
        assert_eq!(run_ok(input), expected, "source: {input}");
    }
}

#[test]
fn test_bang_on_conditional_null() {
    assert_eq!(run_ok("!(if (false) { 5; })"), Val::Bool(true));
}

#[test]
fn test_conditional_value_feeds_let() {
    assert_eq!(
        run_ok("let v = if (1 < 2) { 10 } else { 20 }; v * 2;"),
        Val::Int(20)
    );
}

#[test]
fn test_value_less_branch_is_a_flat_error() {
    // The taken branch ends in a let and leaves no value for the
    // statement's trailing pop. This fails cleanly rather than panicking.
    assert_eq!(run_err("if (true) { let a = 1; }"), "stack underflow");
    // With the branch not taken, the merge pushes null and all is well.
    assert_eq!(run_ok("if (false) { let a = 1; }"), Val::Null);
}

#[test]
fn test_nested_conditionals() {
    assert_eq!(
        run_ok("if (true) { if (false) { 1 } else { 2 } } else { 3 }"),
        Val::Int(2)
    );
}
