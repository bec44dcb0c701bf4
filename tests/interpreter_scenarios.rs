use sorth::runtime::{
    built_ins::base_words::register_base_words,
    data_structures::value::Value,
    interpreter::{Interpreter, sorth_interpreter::SorthInterpreter},
};

fn new_interpreter() -> SorthInterpreter {
    let mut interpreter = SorthInterpreter::new();
    register_base_words(&mut interpreter);
    interpreter
}

fn run(interpreter: &mut SorthInterpreter, source: &str) {
    interpreter
        .process_source("<test>", source)
        .expect("source should compile and run without error");
}

#[test]
fn arithmetic() {
    let mut interpreter = new_interpreter();
    run(&mut interpreter, "3 4 +");

    assert_eq!(interpreter.stack(), &vec![Value::Int(7)]);
}

#[test]
fn word_definition() {
    let mut interpreter = new_interpreter();
    run(&mut interpreter, ": sq dup * ; 5 sq");

    assert_eq!(interpreter.stack(), &vec![Value::Int(25)]);
}

#[test]
fn if_else_via_immediate_words() {
    let mut interpreter = new_interpreter();
    run(&mut interpreter, ": abs dup 0 < if -1 * then ; -7 abs");

    assert_eq!(interpreter.pop().unwrap(), Value::Int(7));

    let mut interpreter = new_interpreter();
    run(&mut interpreter, ": abs dup 0 < if -1 * then ; 3 abs");

    assert_eq!(interpreter.pop().unwrap(), Value::Int(3));
}

#[test]
fn try_catch_recovers_from_a_thrown_error() {
    let mut interpreter = new_interpreter();
    run(&mut interpreter, ": safe try 0 / catch drop -1 endtry ; 10 safe");

    assert_eq!(interpreter.pop().unwrap(), Value::Int(-1));
}

#[test]
fn scoped_variable_read_write_and_out_of_scope_lookup() {
    let mut interpreter = new_interpreter();
    run(&mut interpreter, ": f variable! x 10 x ! x @ ; f");

    assert_eq!(interpreter.pop().unwrap(), Value::Int(10));

    // The variable's defining word only exists inside f's own scope.
    let result = interpreter.process_source("<test>", "x");
    assert!(result.is_err());
}

#[test]
fn dictionary_scoping_drops_definitions_on_release() {
    let mut interpreter = new_interpreter();

    interpreter.mark_context();
    run(&mut interpreter, "5 constant! the-answer");
    assert!(interpreter.find_word("the-answer").is_some());
    interpreter.release_context();

    assert!(interpreter.find_word("the-answer").is_none());
}

#[test]
fn unbalanced_context_is_rejected() {
    let mut interpreter = new_interpreter();

    // A word that marks a context but never releases it should fail on return, not silently
    // leak the scope.
    let result = interpreter.process_source("<test>", ": leaky op.mark_context ; leaky");
    assert!(result.is_err());
}
