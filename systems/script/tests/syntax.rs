use maze_lab_core::{AuthoredProgram, SyntaxTag};
use maze_lab_system_script::templates::Template;
use maze_lab_system_script::{
    compile_program, normalize, parse, render_primitive, Instruction, SyntaxError,
};

#[test]
fn normalized_templates_are_stable_primitive_source() {
    for template in Template::ALL {
        let normalized =
            normalize(template.source(SyntaxTag::Indented)).expect("template normalizes");
        let reparsed = parse(SyntaxTag::PrimitiveCall, &normalized)
            .unwrap_or_else(|error| panic!("{}: {error}\n{normalized}", template.name()));
        // Comments are dropped by the primitive-call tokenizer.
        let uncommented: String = normalized
            .lines()
            .filter(|line| !line.trim_start().starts_with("//"))
            .map(|line| format!("{line}\n"))
            .collect();
        assert_eq!(render_primitive(&reparsed), uncommented);
    }
}

#[test]
fn normalized_breadth_first_declares_names_where_first_bound() {
    let normalized =
        normalize(Template::BreadthFirst.source(SyntaxTag::Indented)).expect("normalizes");

    assert!(normalized.contains("function find_route() {\n  let pos = getPosition();\n"));
    assert!(normalized.contains("function walk_back(came_from, cell) {\n  let route = [];\n"));
    assert!(normalized.contains("  while (queue.length > 0) {\n    let current = queue.shift();\n"));
    assert!(normalized.contains("    cell = link[0];\n"));
    assert!(normalized.contains("if (!came_from.has(step)) {"));
    assert!(normalized.contains("route.unshift(link[1]);"));
    assert!(normalized.contains("await moveUp();"));
    assert!(!normalized.contains("def "));
}

#[test]
fn syntax_errors_render_with_position() {
    let error: SyntaxError =
        parse(SyntaxTag::Indented, "x = 1\ny = (2 +\n").expect_err("unclosed paren");
    assert!(error.to_string().starts_with("SyntaxError: line "));

    let error = parse(SyntaxTag::PrimitiveCall, "let x = 1;\nlet y = @;\n")
        .expect_err("stray character");
    assert_eq!(
        error.to_string(),
        "SyntaxError: line 2, column 9: unexpected character '@'"
    );
}

#[test]
fn compile_program_dispatches_on_the_syntax_tag() {
    let indented = AuthoredProgram::new(SyntaxTag::Indented, "move_up()\n");
    let primitive = AuthoredProgram::new(SyntaxTag::PrimitiveCall, "await moveUp();");

    let first = compile_program(&indented).expect("indented compiles");
    let second = compile_program(&primitive).expect("primitive compiles");

    assert_eq!(first, second);
    assert_eq!(first.instructions.last(), Some(&Instruction::Halt));

    let wrong = AuthoredProgram::new(SyntaxTag::PrimitiveCall, "move_up()\n");
    assert!(compile_program(&wrong).is_err());
}

#[test]
fn capabilities_use_their_own_syntax_spelling() {
    let unit = compile_program(&AuthoredProgram::new(SyntaxTag::Indented, "moveUp()\n"))
        .expect("unknown names still compile");
    assert_eq!(
        unit.instructions[0],
        Instruction::CallUndefined("moveUp".to_owned())
    );
}
