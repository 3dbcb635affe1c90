use dreamberd::environment::{parse_lifetime, Binding, Environment};
use dreamberd::error::{DreamError, RuntimeFault};
use dreamberd::evaluator::Evaluator;
use dreamberd::host::{Clock, Coin, FixedCoin, RandomCoin};
use dreamberd::parser::parse;
use dreamberd::run;
use dreamberd::value::Value;
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A clock that only moves when told to.
#[derive(Clone)]
struct ManualClock(Rc<Cell<SystemTime>>);

impl ManualClock {
    fn at(time: SystemTime) -> Self {
        Self(Rc::new(Cell::new(time)))
    }

    fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.0.get()
    }
}

fn output(source: &str) -> Vec<String> {
    match run(source) {
        Ok(lines) => lines,
        Err(error) => panic!("program failed: {}", error),
    }
}

fn fault(source: &str) -> RuntimeFault {
    match run(source) {
        Err(DreamError::Interpretation(error)) => error.fault,
        other => panic!("expected a runtime fault, got {:?}", other),
    }
}

fn interpret(evaluator: &mut Evaluator, source: &str) -> Result<Value, RuntimeFault> {
    let program = parse(source).expect("source should parse");
    evaluator.interpret(&program).map_err(|error| error.fault)
}

#[test]
fn print_joins_arguments_with_spaces() {
    assert_eq!(output("print(\"a\", 1, true, 2.5)!"), vec!["a 1 true 2.5"]);
}

#[test]
fn division_by_zero_is_undefined() {
    assert_eq!(output("print(1/0)!"), vec!["undefined"]);
    assert_eq!(output("const const nothing = 0! print(5 / nothing)!"), vec!["undefined"]);
    assert_eq!(output("print(7 % 0)!"), vec!["undefined"]);
}

#[test]
fn sentinel_undefined_is_a_string() {
    assert_eq!(
        output("print(1/0 == undefined)! print(1/0 === undefined)!"),
        vec!["true", "false"]
    );
}

#[test]
fn arithmetic() {
    assert_eq!(
        output("print(1 + 2 * 3)! print(10 / 4)! print(6 / 3)! print(2 ^ 10)! print(-7 % 3)! print(1/4 + 1)!"),
        vec!["7", "2.5", "2.0", "1024", "2", "1.25"]
    );
    assert_eq!(output("print(\"Hello \" + \"World\")!"), vec!["Hello World"]);
    assert_eq!(output("print(two + two)!"), vec!["4"]);
}

#[test]
fn adding_string_and_number_is_a_type_mismatch() {
    assert_eq!(
        fault("print(\"a\" + 1)!"),
        RuntimeFault::TypeMismatch {
            operator: "+",
            left: "string",
            right: "int",
        }
    );
}

#[test]
fn equality_ladder() {
    assert_eq!(
        output("print(3 = 3.14)! print(\"3\" == 3)! print(\"3\" === 3)! print(3 ==== 3)! print(3 != 4)!"),
        vec!["true", "true", "false", "true", "true"]
    );
    assert_eq!(output("print(3 = 4)!"), vec!["false"]);
}

#[test]
fn super_strict_equality_compares_arrays_by_identity() {
    assert_eq!(
        output(
            "const const a = [1]! const const b = a! \
             print(a ==== b)! print(a ==== [1])! print(a === [1])!"
        ),
        vec!["true", "false", "true"]
    );
}

#[test]
fn logical_operators_short_circuit() {
    assert_eq!(
        output("print(false || \"fallback\")! print(0 && missing)! print(;true)!"),
        vec!["fallback", "0", "false"]
    );
}

#[test]
fn arrays_start_at_minus_one() {
    assert_eq!(
        output("const const scores = [3, 2, 5]! print(scores[-1])! print(scores[0])! print(scores[1])!"),
        vec!["3", "2", "5"]
    );
}

#[test]
fn float_index_reads_truncate_but_writes_insert() {
    assert_eq!(
        output("var var a = [1, 2, 3]! print(a[0.7])! a[0.5] = 9! print(a)!"),
        vec!["2", "[1, 9, 2, 3]"]
    );
    assert_eq!(
        output("var var a = [1, 2, 3]! a[0] = 7! print(a)!"),
        vec!["[1, 7, 3]"]
    );
}

#[test]
fn out_of_range_index_fails() {
    assert_eq!(
        fault("const const scores = [3, 2, 5]! print(scores[5])!"),
        RuntimeFault::IndexOutOfRange("5".to_string())
    );
}

#[test]
fn huge_float_index_writes_are_out_of_range() {
    for source in [
        "var var a = [1, 2]! a[10 ^ 30] = 5!",
        "var var a = [1, 2]! a[0 - 10 ^ 30] = 5!",
        "var var a = [1, 2]! a[2.5] = 5!",
    ] {
        assert!(
            matches!(fault(source), RuntimeFault::IndexOutOfRange(_)),
            "{}",
            source
        );
    }
    assert_eq!(
        output("var var a = [1, 2]! a[1.5] = 5! a[-1.5] = 0! print(a)!"),
        vec!["[0, 1, 2, 5]"]
    );
}

#[test]
fn repeating_a_string() {
    assert_eq!(output("print(\"ab\" * 3)! print(2 * \"-\")! print(\"x\" * 0)!"), vec!["ababab", "--", ""]);
    assert_eq!(
        fault("print(\"ab\" * 9223372036854775807)!"),
        RuntimeFault::OversizedRepeat {
            length: 2,
            times: 9_223_372_036_854_775_807,
        }
    );
}

#[test]
fn increment_and_decrement() {
    assert_eq!(
        output("var var x = 5! print(++x)! print(x++)! print(x)! print(x--)! print(--x)!"),
        vec!["6", "6", "7", "7", "5"]
    );
}

#[test]
fn stepping_a_string_fails() {
    assert_eq!(
        fault("var var s = \"a\"! s++!"),
        RuntimeFault::NonNumericStep {
            operation: "increment",
            type_name: "string",
        }
    );
}

#[test]
fn global_constants_cannot_be_reassigned() {
    match run("const const const x = 42! print(x)! x = 0! print(x)!") {
        Err(DreamError::Interpretation(error)) => {
            assert_eq!(error.fault, RuntimeFault::ImmutableGlobal("x".to_string()));
            assert_eq!(error.output, vec!["42"]);
        }
        other => panic!("expected ImmutableGlobal, got {:?}", other),
    }
}

#[test]
fn global_constants_survive_shadowing_redeclaration() {
    assert_eq!(
        output("const const const x = 42! const const x = 0!!! print(x)!"),
        vec!["42"]
    );
}

#[test]
fn higher_priority_declaration_wins() {
    assert_eq!(
        output("const const x = 1! const const x = 2!!! const const x = 3! print(x)!"),
        vec!["2"]
    );
    assert_eq!(
        output("const const x = 1!! const const x = 2!! print(x)!"),
        vec!["2"]
    );
    assert_eq!(
        output("const const x = 1! const const x = 2¡ print(x)!"),
        vec!["1"]
    );
}

#[test]
fn reverse_flips_only_top_level_order() {
    assert_eq!(
        output("reverse! print(1)! if (true) { print(2)! print(3)! } print(4)!"),
        vec!["4", "2", "3", "1"]
    );
}

#[test]
fn reverse_flag_persists_in_an_evaluator() {
    let mut evaluator = Evaluator::new();
    interpret(&mut evaluator, "reverse!").unwrap();
    assert!(evaluator.is_reversed());

    interpret(&mut evaluator, "print(1)! print(2)!").unwrap();
    assert_eq!(evaluator.output(), &["2".to_string(), "1".to_string()]);
}

#[test]
fn lifetimes_expire() {
    let clock = ManualClock::at(UNIX_EPOCH + Duration::from_secs(1_000));
    let mut evaluator = Evaluator::new().with_clock(clock.clone());

    interpret(&mut evaluator, "const const name<2s> = \"Luke\"! const const forever<Infinity> = 1!").unwrap();
    assert_eq!(interpret(&mut evaluator, "name!").unwrap().to_string(), "Luke");

    clock.advance(Duration::from_secs(3));
    assert_eq!(
        interpret(&mut evaluator, "print(name)!").unwrap_err(),
        RuntimeFault::UndefinedVariable("name".to_string())
    );

    clock.advance(Duration::from_secs(86_400));
    assert_eq!(interpret(&mut evaluator, "forever!").unwrap().to_string(), "1");
}

#[test]
fn expired_binding_uncovers_outer_one() {
    let start = UNIX_EPOCH + Duration::from_secs(60);
    let mut environment = Environment::new();
    environment.define("label", Binding::new(Value::Str("outer".to_string())));
    environment.push_scope();
    assert_eq!(environment.depth(), 2);
    environment.define(
        "label",
        Binding::new(Value::Str("inner".to_string()))
            .with_expiry(parse_lifetime("1s", start)),
    );

    assert_eq!(environment.lookup("label", start).unwrap().to_string(), "inner");
    let later = start + Duration::from_secs(2);
    assert_eq!(environment.lookup("label", later).unwrap().to_string(), "outer");
}

#[test]
fn global_scope_is_never_popped() {
    let mut environment = Environment::new();
    assert!(environment.pop_scope().is_none());
    assert_eq!(environment.depth(), 1);

    environment.define_global_constant("pi", Value::Float(2.5));
    assert!(environment.is_immutable("pi"));
    assert_eq!(
        environment.assign("pi", Value::Int(3), UNIX_EPOCH).unwrap_err(),
        RuntimeFault::ImmutableGlobal("pi".to_string())
    );
}

#[test]
fn seeded_coin_lands_both_ways() {
    let mut coin = RandomCoin::seeded(42);
    let flips: Vec<bool> = (0..64).map(|_| coin.flip()).collect();
    assert!(flips.contains(&true));
    assert!(flips.contains(&false));

    let mut again = RandomCoin::seeded(42);
    let replayed: Vec<bool> = (0..64).map(|_| again.flip()).collect();
    assert_eq!(flips, replayed);
}

#[test]
fn lifetime_text() {
    let now = UNIX_EPOCH;
    let after = |seconds: u64| Some(now + Duration::from_secs(seconds));

    assert_eq!(parse_lifetime("20s", now), after(20));
    assert_eq!(parse_lifetime("5m", now), after(300));
    assert_eq!(parse_lifetime("1h", now), after(3600));
    assert_eq!(parse_lifetime("2", now), after(2));
    assert_eq!(parse_lifetime("-1", now), after(1));
    assert_eq!(parse_lifetime("1.5m", now), after(90));
    assert_eq!(parse_lifetime("Infinity", now), None);
    assert_eq!(parse_lifetime("soon", now), None);
}

#[test]
fn deleted_variables_stay_deleted() {
    assert_eq!(
        fault("var var x = 1! delete x! print(x)!"),
        RuntimeFault::DeletedVariable("x".to_string())
    );
}

#[test]
fn deleted_numbers_poison_arithmetic() {
    assert_eq!(output("delete 3! print(1 + 2)!"), vec!["3"]);
    assert_eq!(
        fault("delete 3! print(3 + 1)!"),
        RuntimeFault::PoisonedArithmetic("3".to_string())
    );
}

#[test]
fn temporal_operators() {
    assert_eq!(
        output("var var x = 1! x = 2! x = 3! print(previous x)! print(current x)!"),
        vec!["2", "3"]
    );
    assert_eq!(output("var var y = 1! print(previous y)!"), vec!["1"]);
    assert_eq!(fault("var var x = 1! next x!"), RuntimeFault::UnimplementedOperator("next"));
}

#[test]
fn functions() {
    assert_eq!(
        output("function add(a, b) => a + b! print(add(2, 3))!"),
        vec!["5"]
    );
    assert_eq!(
        output("func greet(name) => { return \"Hi \" + name! }! print(greet(\"Bo\"))!"),
        vec!["Hi Bo"]
    );
    assert_eq!(
        output("fn last() => { 1! 2! }! print(last())!"),
        vec!["2"]
    );
    assert_eq!(
        output("fun stop() => { return 1! print(\"unreachable\")! }! print(stop())!"),
        vec!["1"]
    );
}

#[test]
fn return_inside_if_does_not_leave_the_function() {
    assert_eq!(
        output("fun pick(x) => { if (x) { return 1! } return 2! }! print(pick(true))!"),
        vec!["2"]
    );
}

#[test]
fn missing_arguments_are_undefined() {
    assert_eq!(
        output("function show(a, b) => b! print(show(1))!"),
        vec!["undefined"]
    );
}

#[test]
fn calling_an_unknown_name_fails() {
    assert_eq!(fault("nope()!"), RuntimeFault::UndefinedFunction("nope".to_string()));
    assert_eq!(fault("const const x = 1! x()!"), RuntimeFault::NotCallable("int"));
}

#[test]
fn async_and_await_run_synchronously() {
    assert_eq!(
        output("async func later() => 5! print(await later())!"),
        vec!["5"]
    );
}

#[test]
fn signals_read_and_write() {
    assert_eq!(
        output("const const score = use(0)! print(score())! score(5)! print(score())!"),
        vec!["0", "5"]
    );
}

#[test]
fn classes_have_one_instance() {
    let program = "class Player { const var health = 10! }! \
                   const const p = new Player()! print(p.health)! \
                   p.health = 5! print(p.health)!";
    assert_eq!(output(program), vec!["10", "5"]);

    match run(&format!("{} new Player()!", program)) {
        Err(DreamError::Interpretation(error)) => {
            assert_eq!(error.fault, RuntimeFault::DuplicateInstance("Player".to_string()));
            assert_eq!(error.fault.to_string(), "Can't have more than one 'Player' instance!");
            assert_eq!(error.output, vec!["10", "5"]);
        }
        other => panic!("expected DuplicateInstance, got {:?}", other),
    }
}

#[test]
fn class_methods_are_fields() {
    assert_eq!(
        output("class Greeter { function hello() => \"hello\"! }! const const g = new Greeter()! print(g.hello())!"),
        vec!["hello"]
    );
}

#[test]
fn missing_members_and_classes() {
    assert_eq!(
        fault("class Empty { }! const const e = new Empty()! print(e.nothing)!"),
        RuntimeFault::MissingMember("nothing".to_string())
    );
    assert_eq!(fault("new Ghost()!"), RuntimeFault::UndefinedClass("Ghost".to_string()));
}

#[test]
fn debug_terminator_reports_type() {
    assert_eq!(
        output("1 + 1? const const x = 1.5? x = \"s\"?"),
        vec![
            "DEBUG: 2 (type: int)",
            "DEBUG: 1.5 (type: float)",
            "DEBUG: s (type: string)",
        ]
    );
}

#[test]
fn string_interpolation() {
    assert_eq!(
        output("const const name = \"World\"! print(\"Hello ${name}!\")! print(\"{2 + 3}€ £{1}¥{2}\")!"),
        vec!["Hello World!", "5 12"]
    );
}

#[test]
fn when_and_if_else() {
    assert_eq!(
        output("var var x = 5! when (x = 5) { print(\"five\")! } if (x > 10) { print(\"big\")! } else { print(\"small\")! }"),
        vec!["five", "small"]
    );
}

#[test]
fn maybe_is_decided_by_the_coin() {
    let source = "if (maybe) { print(\"yes\")! } else { print(\"no\")! }";

    let mut heads = Evaluator::new().with_coin(FixedCoin(true));
    interpret(&mut heads, source).unwrap();
    assert_eq!(heads.output(), &["yes".to_string()]);

    let mut tails = Evaluator::new().with_coin(FixedCoin(false));
    interpret(&mut tails, source).unwrap();
    assert_eq!(tails.output(), &["no".to_string()]);
}

#[test]
fn file_blocks_export_and_import() {
    let source = "===== add.db =====\n\
                  function add(a, b) => a + b!\n\
                  export add to \"main.db\"!\n\
                  \n\
                  ===== main.db =====\n\
                  import add!\n\
                  print(add(3, 2))!\n";
    assert_eq!(output(source), vec!["5"]);
}

#[test]
fn file_blocks_have_their_own_scope() {
    assert_eq!(
        fault("===== a =====\nvar var x = 1!\n===== b =====\nprint(x)!"),
        RuntimeFault::UndefinedVariable("x".to_string())
    );
    assert_eq!(fault("import nothing!"), RuntimeFault::MissingExport("nothing".to_string()));
}

#[test]
fn date_now_reads_the_clock() {
    let clock = ManualClock::at(UNIX_EPOCH + Duration::from_millis(1_500));
    let mut evaluator = Evaluator::new().with_clock(clock);
    interpret(&mut evaluator, "print(Date.now())!").unwrap();
    assert_eq!(evaluator.output(), &["1500.0".to_string()]);
}

#[test]
fn noops_do_nothing() {
    assert_eq!(output("\"just words\"! noop! print(1)!"), vec!["1"]);
}

#[test]
fn output_before_a_fault_is_kept() {
    match run("print(\"before\")! print(missing)! print(\"after\")!") {
        Err(DreamError::Interpretation(error)) => {
            assert_eq!(error.fault, RuntimeFault::UndefinedVariable("missing".to_string()));
            assert_eq!(error.output, vec!["before"]);
        }
        other => panic!("expected an interpretation error, got {:?}", other),
    }
}

#[test]
fn parse_errors_surface_from_run() {
    assert!(matches!(run("print("), Err(DreamError::Parse(_))));
}

#[test]
fn reset_forgets_state() {
    let mut evaluator = Evaluator::new();
    interpret(&mut evaluator, "const const x = 1! class A { }! new A()!").unwrap();
    interpret(&mut evaluator, "reverse!").unwrap();

    evaluator.reset();
    assert!(evaluator.get_variable("x").is_none());
    assert!(!evaluator.is_reversed());
    assert_eq!(
        interpret(&mut evaluator, "new A()!").unwrap_err(),
        RuntimeFault::UndefinedClass("A".to_string())
    );
}
