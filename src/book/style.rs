//! Inline `style` attribute parsing.

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser,
};

/// Split an inline style attribute into normalized `property: value`
/// declarations. Property names are lowercased, value whitespace collapsed,
/// and anything cssparser can't read as a declaration is skipped.
pub(crate) fn inline_declarations(style: &str) -> Vec<String> {
    let mut input = ParserInput::new(style);
    let mut parser = Parser::new(&mut input);
    let mut declarations = Vec::new();
    let mut decl_parser = InlineStyleParser {
        declarations: &mut declarations,
    };

    for result in RuleBodyParser::new(&mut parser, &mut decl_parser) {
        if let Err((_, slice)) = result {
            log::trace!("skipping unparseable inline declaration: {slice:?}");
        }
    }

    declarations
}

struct InlineStyleParser<'a> {
    declarations: &'a mut Vec<String>,
}

impl<'i> DeclarationParser<'i> for InlineStyleParser<'_> {
    type Declaration = ();
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let start = input.position();
        while input.next().is_ok() {}
        let value = input
            .slice_from(start)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if value.is_empty() {
            return Err(input.new_custom_error(()));
        }

        self.declarations
            .push(format!("{}: {}", name.to_ascii_lowercase(), value));
        Ok(())
    }
}

impl<'i> AtRuleParser<'i> for InlineStyleParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        _name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }
}

impl<'i> QualifiedRuleParser<'i> for InlineStyleParser<'_> {
    type Prelude = ();
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }
}

impl<'i> RuleBodyItemParser<'i, (), ()> for InlineStyleParser<'_> {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declarations_are_normalized() {
        assert_eq!(
            inline_declarations("COLOR: red;  margin:0   auto ;"),
            vec!["color: red", "margin: 0 auto"]
        );
    }

    #[test]
    fn test_important_is_kept_in_value() {
        assert_eq!(
            inline_declarations("font-weight: bold !important"),
            vec!["font-weight: bold !important"]
        );
    }

    #[test]
    fn test_garbage_is_skipped() {
        assert_eq!(inline_declarations("color red; width: 10px"), vec!["width: 10px"]);
        assert!(inline_declarations("").is_empty());
    }
}
