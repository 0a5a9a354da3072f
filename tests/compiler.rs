#[cfg(test)]
mod tests {
    use zero::compiler::compile;

    #[test]
    fn hello_world_compiles_without_error() {
        let source = b"++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.\
            <-.<.+++.------.--------.>>+.>++.";
        assert!(compile(source).is_ok());
    }

    #[test]
    fn comment_only_program_still_emits_prelude_and_postlude() {
        let code = compile(b"this has no brainfuck characters").unwrap();
        assert_eq!(code.len(), 6);
    }

    #[test]
    fn nested_loops_balance_correctly() {
        let code = compile(b"+[>+[>+<-]<-]");
        assert!(code.is_ok());
    }

    #[test]
    fn dangling_open_bracket_is_rejected() {
        let err = compile(b"+++[").unwrap_err();
        assert_eq!(err, zero::error::ParseError::ExpectedClose);
    }

    #[test]
    fn dangling_close_bracket_is_rejected() {
        let err = compile(b"+++]").unwrap_err();
        assert_eq!(err, zero::error::ParseError::ExpectedOpen);
    }
}
