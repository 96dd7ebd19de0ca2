//! Persona and prompt templates.

use crate::chatbot::format::truncate_chars;
use crate::chatbot::registry::CapabilitySpec;
use crate::chatbot::store::{ChatRecord, UserProfile};
use crate::intent::Intent;

pub const DEFAULT_PERSONA: &str = "You are Ballu, a friendly and helpful assistant.

Personality rules:
1. You are Ballu, a helpful friend. Don't call yourself a bot or an AI model.
2. Be friendly, conversational and to the point.
3. You are still learning new things, and it's fine to say so.
4. You can help with weather, stock prices, news, image generation, memes, finding places nearby and general conversation.
5. Reply in plain text without markdown formatting.";

pub const GREETING_TEXT: &str = "👋 Hi there! I'm Ballu, your friendly assistant! 🤖

🌟 What I can help you with:

🌤️ Weather Updates - Ask me about weather in any city!
📊 Stock Information - Get real-time stock prices!
📰 Latest News - Stay updated with current events!
🎨 Image Generation - Create images from text descriptions!
🎭 Memes - Make a meme about anything!
🍽️ Places Search - Find restaurants, bars and cafes near you!
💬 General Chat - Just want to talk? I'm here for that too!

What would you like to know about today? 😊";

pub const WELCOME_CAPTION: &str = "Welcome to Ballu! 🤖✨";

pub const LOCATION_REQUEST_TEXT: &str = "📍 I'd love to help you find places! Please share your location using the button below, and then tell me what type of places you're looking for (restaurants, bars, cafes, etc.).";

pub const GENERAL_ERROR_TEXT: &str = "Sorry, I hit an error. Please try again.";

pub const VOICE_ERROR_TEXT: &str = "🎤 Sorry, I couldn't understand that voice message. Could you try again or type it out?";

pub const VOICE_DISABLED_TEXT: &str = "🎤 I can't listen to voice messages right now. Could you type it out instead?";

pub fn welcome_text(first_name: &str) -> String {
    format!(
        "🎉 Welcome {first_name}! I'm Ballu, your friendly assistant! 🤖

🌟 Here's what you can ask me:

🌤️ Weather - \"Weather in Mumbai\"
📊 Stocks - \"Stock price of AAPL\"
📰 News - \"Latest news\", \"Technology news\"
🎨 Images - \"Generate an image of a sunset\"
🎭 Memes - \"Make a meme about Mondays\"
🍽️ Places - \"Find cafes near me\"
🎤 Voice - Send me a voice note and I'll listen!

I'm still learning, so feel free to ask me anything! 😊"
    )
}

pub fn location_saved_text(lat: f64, lon: f64) -> String {
    format!(
        "📍 Got your location ({lat:.4}, {lon:.4})! What kind of places should I look for? Try \"restaurants near me\", \"cafes\" or \"bars\"."
    )
}

pub fn heard_text(transcript: &str) -> String {
    format!("🎤 I heard: \"{transcript}\"")
}

/// Second pass for capabilities whose raw output reads better rephrased.
pub fn follow_up_prompt(persona: &str, user_message: &str, function_name: &str, result: &str) -> String {
    format!(
        r#"{persona}

The user asked: "{user_message}"

I called the function {function_name} and got this result:
{result}

Now provide a natural, conversational response to the user with this information.
Remember:
- Don't mention that you called a function
- Just give the information naturally
- If there was an error, apologize and offer to help with something else"#
    )
}

pub fn clarification_prompt(persona: &str, spec: &CapabilitySpec, user_message: &str) -> String {
    let ask = if spec.intent == Intent::Image {
        "The user wants to generate an image but hasn't said what they want to see.
Ask them what kind of image they'd like in a friendly, conversational way.
Give them a few examples like \"a beautiful sunset\", \"a cute cat\" or \"a futuristic city\"."
            .to_string()
    } else {
        format!(
            "The user is asking about {}, but I need more specific information: {}.
Ask them for the details in a friendly, conversational way, in one or two sentences.",
            spec.intent, spec.clarify_hint
        )
    };

    format!("{persona}\n\n{ask}\n\nUser message: \"{user_message}\"")
}

/// Used when the model can't be reached for a clarification.
pub fn canned_clarification(spec: &CapabilitySpec) -> String {
    format!("Happy to help with that! Could you tell me {}? 😊", spec.clarify_hint)
}

/// `history` comes most recent first; the prompt shows it oldest first.
pub fn general_prompt(
    persona: &str,
    profile: Option<&UserProfile>,
    history: &[ChatRecord],
    entry_chars: usize,
    user_message: &str,
) -> String {
    let mut context = String::new();

    if let Some(profile) = profile {
        context.push_str(&format!(
            "User: {} (Messages: {})\n",
            profile.first_name, profile.total_messages
        ));
    }

    if !history.is_empty() {
        context.push_str("Recent conversation:\n");
        for chat in history.iter().rev() {
            context.push_str(&format!("User: {}\n", truncate_chars(&chat.user_message, entry_chars)));
            context.push_str(&format!("Ballu: {}\n", truncate_chars(&chat.bot_response, entry_chars)));
        }
    }

    if context.is_empty() {
        format!("{persona}\n\n{user_message}")
    } else {
        format!("{persona}\n\n{context}Current message: {user_message}")
    }
}
