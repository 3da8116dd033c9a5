use parlance_api::SpeechParams;
use parlance_bridge::{Exchange, MessageFromBackend};

/// Handles a typed chat prompt (see
/// [`parlance_bridge::MessageToBackend::ChatRequest`]).
pub async fn handle_chat_request(context: super::AppContextHandle, prompt: String) {
    let (client, languages) = {
        let state = context.state.read().await;
        (state.api_client.clone(), state.config.languages.clone())
    };

    match client.chat(&prompt, &languages.source, &languages.target).await {
        Ok(reply) => {
            {
                let mut state = context.state.write().await;
                state.conversation.push(Exchange {
                    user_text: prompt,
                    reply_text: reply.clone(),
                });
            }
            context
                .send(MessageFromBackend::AssistantReply { text: reply })
                .await;
        }
        Err(error) => super::report_dispatch_error(&context, "chat", error).await,
    }
}

/// Handles a translation request for a batch of sentences.
pub async fn handle_translate_request(context: super::AppContextHandle, sentences: Vec<String>) {
    let (client, languages) = {
        let state = context.state.read().await;
        (state.api_client.clone(), state.config.languages.clone())
    };

    match client
        .translate(&sentences, &languages.source, &languages.target)
        .await
    {
        Ok(translations) => {
            context
                .send(MessageFromBackend::TranslationResponse(translations))
                .await;
        }
        Err(error) => super::report_dispatch_error(&context, "translate", error).await,
    }
}

/// Handles a question about an image.
pub async fn handle_visual_query_request(
    context: super::AppContextHandle,
    image: Vec<u8>,
    query: String,
) {
    let (client, languages) = {
        let state = context.state.read().await;
        (state.api_client.clone(), state.config.languages.clone())
    };

    match client
        .visual_query(image, &query, &languages.source, &languages.target)
        .await
    {
        Ok(answer) => {
            context
                .send(MessageFromBackend::VisualQueryResponse { answer })
                .await;
        }
        Err(error) => super::report_dispatch_error(&context, "visual query", error).await,
    }
}

/// Handles a speech-synthesis request for the given text.
pub async fn handle_speak_request(context: super::AppContextHandle, text: String) {
    let (client, speech) = {
        let state = context.state.read().await;
        (state.api_client.clone(), state.config.speech.clone())
    };

    let params = SpeechParams {
        voice: speech.voice,
        model: speech.model,
        response_format: speech.response_format,
        speed: speech.speed,
    };

    match client.text_to_speech(&text, &params).await {
        Ok(audio) => {
            context
                .send(MessageFromBackend::SpeechSynthesized(audio))
                .await;
        }
        Err(error) => super::report_dispatch_error(&context, "speech synthesis", error).await,
    }
}

/// Replays the in-memory conversation log to the frontend.
pub async fn handle_conversation_log_request(context: super::AppContextHandle) {
    let conversation = {
        let state = context.state.read().await;
        state.conversation.clone()
    };
    context
        .send(MessageFromBackend::ConversationLogResponse(conversation))
        .await;
}
