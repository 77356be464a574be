//! The stock stage set.

use std::sync::Arc;

use crate::wiki::config::DispatchConfig;
use crate::wiki::pipeline::{PipelineBuildError, PipelineRecipe, QueueDispatcher};

use super::attributes::AttributeStage;
use super::expansion::{ExpansionStage, TemplateSource};
use super::lists::ListStage;
use super::quotes::QuoteStage;
use super::references::ReferenceStage;
use super::tag_balance::TagBalanceStage;

/// Every built-in stage, templates resolved through `templates`.
pub fn standard_recipe(templates: Arc<dyn TemplateSource>) -> Result<PipelineRecipe, PipelineBuildError> {
    PipelineRecipe::builder()
        .stage(|| Box::new(AttributeStage::new()))
        .stage(|| Box::new(ReferenceStage::new()))
        .stage(move || Box::new(ExpansionStage::new(Arc::clone(&templates))))
        .stage(|| Box::new(QuoteStage::new()))
        .stage(|| Box::new(ListStage::new()))
        .stage(|| Box::new(TagBalanceStage::new()))
        .build()
}

pub fn standard_dispatcher(
    templates: Arc<dyn TemplateSource>,
    config: DispatchConfig,
) -> Result<QueueDispatcher, PipelineBuildError> {
    Ok(QueueDispatcher::new(standard_recipe(templates)?, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::testing::{assert_described, assert_strictly_increasing};
    use crate::wiki::transforms::expansion::InMemoryTemplates;

    fn dispatcher(templates: InMemoryTemplates) -> QueueDispatcher {
        standard_dispatcher(Arc::new(templates), DispatchConfig::default()).unwrap()
    }

    #[test]
    fn test_stage_order() {
        let recipe = standard_recipe(Arc::new(InMemoryTemplates::new())).unwrap();
        assert_eq!(
            recipe.stage_names(),
            vec!["attributes", "references", "expansion", "quotes", "lists", "tag_balance"]
        );
    }

    #[test]
    fn test_template_inside_list_item() {
        let templates = InMemoryTemplates::new().with("b", "'''{{{1}}}'''");
        let tokens = dispatcher(templates)
            .dispatch_text("*{{b|x}}")
            .collect_tokens()
            .unwrap();
        assert_described(
            &tokens,
            &[
                "TagOpen(ul)",
                "TagOpen(li)",
                "SelfClosingTag(meta typeof=\"mw:Transclusion\" data-target=\"b\")",
                "TagOpen(b)",
                "Text(\"x\")",
                "TagClose(b)",
                "SelfClosingTag(meta typeof=\"mw:Transclusion/End\")",
                "TagClose(li)",
                "TagClose(ul)",
                "EndOfInput",
            ],
        );
        assert_strictly_increasing(&tokens);
    }

    #[test]
    fn test_refs_from_templates_share_numbering() {
        let templates = InMemoryTemplates::new().with("cite", "<ref>{{{1}}}</ref>");
        let tokens = dispatcher(templates)
            .dispatch_text("<ref>a</ref>{{cite|b}}<ref>c</ref>")
            .collect_tokens()
            .unwrap();
        let indexes: Vec<&str> = tokens
            .iter()
            .filter_map(|t| t.tag().and_then(|tag| tag.attribute("index")))
            .collect();
        assert_eq!(indexes, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_unbalanced_bold_tag_is_closed() {
        let tokens = dispatcher(InMemoryTemplates::new())
            .dispatch_text("<b>hello")
            .collect_tokens()
            .unwrap();
        assert_described(
            &tokens,
            &["TagOpen(b)", "Text(\"hello\")", "TagClose(b)", "EndOfInput"],
        );
    }

    fn transclusion(target: &str) -> String {
        format!("SelfClosingTag(meta typeof=\"mw:Transclusion\" data-target=\"{}\")", target)
    }

    const TRANSCLUSION_END: &str = "SelfClosingTag(meta typeof=\"mw:Transclusion/End\")";

    #[test]
    fn test_template_that_starts_a_list() {
        let tokens = dispatcher(InMemoryTemplates::new().with("t", "*a"))
            .dispatch_text("{{t}}")
            .collect_tokens()
            .unwrap();
        assert_described(
            &tokens,
            &[
                transclusion("t").as_str(),
                "TagOpen(ul)",
                "TagOpen(li)",
                "Text(\"a\")",
                TRANSCLUSION_END,
                "TagClose(li)",
                "TagClose(ul)",
                "EndOfInput",
            ],
        );
        assert_strictly_increasing(&tokens);
    }

    #[test]
    fn test_template_that_starts_with_four_ticks() {
        let tokens = dispatcher(InMemoryTemplates::new().with("t", "''''x'''"))
            .dispatch_text("{{t}}")
            .collect_tokens()
            .unwrap();
        assert_described(
            &tokens,
            &[
                transclusion("t").as_str(),
                "Text(\"'\")",
                "TagOpen(b)",
                "Text(\"x\")",
                "TagClose(b)",
                TRANSCLUSION_END,
                "EndOfInput",
            ],
        );
        assert_strictly_increasing(&tokens);
    }

    #[test]
    fn test_template_that_closes_an_outer_tag() {
        let tokens = dispatcher(InMemoryTemplates::new().with("t", "</i>"))
            .dispatch_text("<i><b>{{t}}")
            .collect_tokens()
            .unwrap();
        assert_described(
            &tokens,
            &[
                "TagOpen(i)",
                "TagOpen(b)",
                transclusion("t").as_str(),
                "TagClose(b)",
                "TagClose(i)",
                "TagOpen(b)",
                TRANSCLUSION_END,
                "TagClose(b)",
                "EndOfInput",
            ],
        );
        assert_strictly_increasing(&tokens);
    }
}
