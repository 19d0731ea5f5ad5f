//! System prompts for the onboarding loop

use crate::request::ShipType;

/// System prompt for the opening turn of a request.
///
/// Guides the model toward the ship-type-specific start tool before any
/// code is written.
pub fn onboarding_prompt(ship_type: ShipType) -> String {
    let tool_guidance = match ship_type {
        ShipType::Portfolio => {
            "The user wants a portfolio website. Once you have enough information about \
             their work, style, and content, call the start_shipping_portfolio_tool to \
             capture the requirements."
        }
        ShipType::LandingPage => {
            "The user wants a landing page. Once you have enough information about the \
             product, audience, and call to action, call the start_shipping_landing_page_tool \
             to capture the requirements."
        }
        ShipType::EmailTemplate => {
            "The user wants an email template. Once you have enough information about the \
             purpose, tone, and content, call the start_shipping_email_template_tool to \
             capture the requirements."
        }
        ShipType::Prompt => {
            "The user described the website they want in their own words. Gather any \
             missing requirements, then move straight to building."
        }
    };

    format!(
        "You are the onboarding assistant for a website generation service. \
         Your job is to turn the user's request into a deployed website.\n\n\
         {}\n\n\
         You may use the search_tool to research content and the \
         image_analysis_tool to understand any images the user attached. \
         If you are missing essential information, ask the user directly and \
         end your turn. Do not invent facts about the user.",
        tool_guidance
    )
}

/// Narrower system prompt used after the first tool result comes back.
///
/// At this point requirements are captured and the model should drive toward
/// deployment.
pub fn continuation_prompt() -> String {
    "Requirements are captured. Proceed toward deployment: coordinate with the \
     cto_tool to generate the website code and deploy it. Call the cto_tool with \
     a project name and the complete set of files. Only ask the user further \
     questions if the build cannot proceed without an answer."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onboarding_prompt_names_start_tool() {
        assert!(onboarding_prompt(ShipType::Portfolio).contains("start_shipping_portfolio_tool"));
        assert!(
            onboarding_prompt(ShipType::LandingPage).contains("start_shipping_landing_page_tool")
        );
        assert!(
            onboarding_prompt(ShipType::EmailTemplate)
                .contains("start_shipping_email_template_tool")
        );
    }

    #[test]
    fn test_prompt_ship_type_has_no_start_tool() {
        assert!(!onboarding_prompt(ShipType::Prompt).contains("start_shipping"));
    }

    #[test]
    fn test_continuation_prompt_names_cto_tool() {
        assert!(continuation_prompt().contains("cto_tool"));
    }
}
