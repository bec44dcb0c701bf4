//! Table-driven checks of individual primitive words' stack effects, run directly against the
//! interpreter with no standard-library script loaded.

use sorth::runtime::{
    built_ins::base_words::register_base_words,
    data_structures::value::Value,
    error::Result,
    interpreter::{sorth_interpreter::SorthInterpreter, CodeManagement, Interpreter},
};
use test_case::test_case;

fn eval_and_stack(source: &str, init_stack: &[i64]) -> Result<Vec<i64>> {
    let mut interpreter = SorthInterpreter::new();
    register_base_words(&mut interpreter);

    for &value in init_stack {
        interpreter.push(Value::from(value));
    }

    interpreter.process_source("<test>", source)?;

    Ok(interpreter.stack().iter().map(Value::get_int_val).collect())
}

#[test_case("+", &[2, 2], &[4]; "add")]
#[test_case("-", &[5, 2], &[3]; "subtract")]
#[test_case("*", &[3, 4], &[12]; "multiply")]
#[test_case("/", &[12, 3], &[4]; "divide")]
#[test_case("mod", &[13, 5], &[3]; "modulo")]
#[test_case("/mod", &[13, 5], &[3, 2]; "divide and modulo")]
#[test_case("negate", &[9], &[-9]; "negate")]
#[test_case("abs", &[-9], &[9]; "abs of negative")]
#[test_case("abs", &[9], &[9]; "abs of positive")]
#[test_case("<", &[1, 2], &[-1]; "less is true")]
#[test_case("<", &[2, 1], &[0]; "less is false")]
#[test_case("and", &[-1, -1], &[-1]; "and true true")]
#[test_case("or", &[0, -1], &[-1]; "or false true")]
#[test_case("swap", &[1, 2], &[2, 1]; "swap")]
#[test_case("dup", &[42], &[42, 42]; "dup")]
#[test_case("drop", &[1, 2], &[1]; "drop")]
#[test_case("rot", &[1, 2, 3], &[2, 3, 1]; "rot")]
#[test_case("over", &[1, 2], &[1, 2, 1]; "over")]
#[test_case("depth", &[1, 2, 3], &[1, 2, 3, 3]; "depth")]
#[test_case("1 if 42 then", &[], &[42]; "if then taken")]
#[test_case("0 if 1 else 2 then", &[], &[2]; "if else then not taken")]
#[test_case(": f 42 ; f", &[], &[42]; "trivial word definition")]
#[test_case("begin 1 + dup 10 > until", &[0], &[11]; "begin until loop")]
#[test_case("begin 1 + dup 10 < while repeat", &[0], &[10]; "begin while repeat loop")]
fn stack_effect(source: &str, init_stack: &[i64], expected: &[i64]) {
    let stack = eval_and_stack(source, init_stack).expect("source should run without error");
    assert_eq!(stack, expected);
}
