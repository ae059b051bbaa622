mod private
{
  use crate::credential_vault::CredentialVault;
  use crate::error::{ KernelError, Result };
  use crate::provider_registry::types::
  {
    ChatReply, ChatRequest, Provider, ProviderEventStream, ProviderStreamEvent, Usage,
  };
  use async_trait::async_trait;
  use eventsource_stream::Eventsource;
  use futures_util::StreamExt;
  use secrecy::{ ExposeSecret, SecretString };
  use serde::{ Deserialize, Serialize };

  const ORIGIN : &str = "https://api.openai.com";

  #[ derive( Debug, Serialize ) ]
  struct WireMessage< 'a >
  {
    role : &'a str,
    content : &'a str,
  }

  #[ derive( Debug, Serialize ) ]
  struct WireRequest< 'a >
  {
    model : &'a str,
    messages : Vec< WireMessage< 'a > >,
    stream : bool,
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    max_tokens : Option< u32 >,
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    temperature : Option< f32 >,
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    top_p : Option< f32 >,
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    frequency_penalty : Option< f32 >,
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    presence_penalty : Option< f32 >,
    #[ serde( skip_serializing_if = "Vec::is_empty" ) ]
    stop : Vec< String >,
  }

  fn wire_messages< 'a >( request : &'a ChatRequest ) -> Vec< WireMessage< 'a > >
  {
    let mut messages = Vec::with_capacity( request.prior_turns.len() + 2 );
    if let Some( system ) = request.system_prompt.as_deref()
    {
      messages.push( WireMessage { role : "system", content : system } );
    }
    for turn in &request.prior_turns
    {
      messages.push( WireMessage { role : &turn.role, content : &turn.content } );
    }
    messages.push( WireMessage { role : "user", content : &request.user_message } );
    messages
  }

  fn wire_request< 'a >( request : &'a ChatRequest, stream : bool ) -> WireRequest< 'a >
  {
    WireRequest
    {
      model : &request.model,
      messages : wire_messages( request ),
      stream,
      max_tokens : request.parameters.max_tokens,
      temperature : request.parameters.temperature,
      top_p : request.parameters.top_p,
      frequency_penalty : request.parameters.frequency_penalty,
      presence_penalty : request.parameters.presence_penalty,
      stop : request.parameters.stop_sequences.clone(),
    }
  }

  #[ derive( Debug, Deserialize ) ]
  struct WireUsage
  {
    #[ serde( default ) ]
    prompt_tokens : u64,
    #[ serde( default ) ]
    completion_tokens : u64,
  }

  #[ derive( Debug, Deserialize ) ]
  struct WireChoiceMessage
  {
    content : Option< String >,
  }

  #[ derive( Debug, Deserialize ) ]
  struct WireChoiceDelta
  {
    content : Option< String >,
  }

  #[ derive( Debug, Deserialize ) ]
  struct WireChoice
  {
    message : Option< WireChoiceMessage >,
    delta : Option< WireChoiceDelta >,
    finish_reason : Option< String >,
  }

  #[ derive( Debug, Deserialize ) ]
  struct WireResponse
  {
    choices : Vec< WireChoice >,
    usage : Option< WireUsage >,
  }

  /// The OpenAI provider : the canonical `/v1/chat/completions` wire format
  /// (spec §4.3), shared near-verbatim by DeepSeek's OpenAI-compatible API.
  #[ derive( Debug ) ]
  pub struct OpenAiProvider
  {
    client : reqwest::Client,
    base_url : String,
  }

  impl Default for OpenAiProvider
  {
    fn default() -> Self
    {
      Self { client : reqwest::Client::default(), base_url : ORIGIN.to_string() }
    }
  }

  impl OpenAiProvider
  {
    /// Builds a provider over a dedicated HTTP client with the configured
    /// request timeout.
    #[ must_use ]
    pub fn new( request_timeout_ms : u64 ) -> Self
    {
      let client = reqwest::Client::builder()
        .timeout( std::time::Duration::from_millis( request_timeout_ms ) )
        .build()
        .unwrap_or_default();
      Self { client, base_url : ORIGIN.to_string() }
    }

    /// Overrides the base URL requests are sent to, leaving `origin()`'s
    /// allow-listed value untouched. Mirrors `api_claude::Environment::with_base_url`.
    #[ must_use ]
    pub fn with_base_url( mut self, base_url : String ) -> Self
    {
      self.base_url = base_url;
      self
    }
  }

  #[ async_trait ]
  impl Provider for OpenAiProvider
  {
    fn id( &self ) -> &'static str
    {
      "openai"
    }

    fn accepts( &self, model : &str ) -> bool
    {
      model.starts_with( "gpt-" ) || model.starts_with( "o1" ) || model.starts_with( "o3" )
    }

    fn origin( &self ) -> &'static str
    {
      ORIGIN
    }

    fn validate_key( &self, key : &str ) -> bool
    {
      CredentialVault::validate_format( "openai", key )
    }

    async fn chat( &self, api_key : &SecretString, request : &ChatRequest ) -> Result< ChatReply >
    {
      let body = wire_request( request, false );
      let response = self.client
        .post( format!( "{}/v1/chat/completions", self.base_url ) )
        .bearer_auth( api_key.expose_secret() )
        .json( &body )
        .send()
        .await?;

      if !response.status().is_success()
      {
        return Err( KernelError::from( response.error_for_status().unwrap_err() ) );
      }

      let wire : WireResponse = response.json().await?;
      let content = wire.choices.into_iter().next()
        .and_then( | c | c.message )
        .and_then( | m | m.content )
        .ok_or_else( || KernelError::ResponseMalformed( "no choices in openai response".into() ) )?;

      let usage = wire.usage
        .map( | u | Usage { prompt_tokens : u.prompt_tokens, completion_tokens : u.completion_tokens } )
        .unwrap_or_else( Usage::conservative_default );

      let cost = crate::provider_registry::cost::compute_cost( usage, &request.model );
      Ok( ChatReply { content, usage, cost } )
    }

    async fn stream( &self, api_key : &SecretString, request : &ChatRequest ) -> Result< ProviderEventStream >
    {
      let body = wire_request( request, true );
      let response = self.client
        .post( format!( "{}/v1/chat/completions", self.base_url ) )
        .bearer_auth( api_key.expose_secret() )
        .json( &body )
        .send()
        .await?;

      if !response.status().is_success()
      {
        return Err( KernelError::from( response.error_for_status().unwrap_err() ) );
      }

      let mut source = response.bytes_stream().eventsource();

      let stream = async_stream::stream!
      {
        let mut accumulated_usage = Usage::conservative_default();
        while let Some( event ) = source.next().await
        {
          match event
          {
            Ok( event ) =>
            {
              if event.data == "[DONE]"
              {
                yield Ok( ProviderStreamEvent::Done
                {
                  final_content : None,
                  usage : accumulated_usage,
                  finish_reason : None,
                } );
                return;
              }

              match serde_json::from_str::< WireResponse >( &event.data )
              {
                Ok( wire ) =>
                {
                  if let Some( usage ) = wire.usage
                  {
                    accumulated_usage = Usage
                    {
                      prompt_tokens : usage.prompt_tokens,
                      completion_tokens : usage.completion_tokens,
                    };
                  }
                  if let Some( choice ) = wire.choices.into_iter().next()
                  {
                    if let Some( delta ) = choice.delta.and_then( | d | d.content )
                    {
                      yield Ok( ProviderStreamEvent::ContentDelta( delta ) );
                    }
                    if choice.finish_reason.is_some()
                    {
                      yield Ok( ProviderStreamEvent::Done
                      {
                        final_content : None,
                        usage : accumulated_usage,
                        finish_reason : choice.finish_reason,
                      } );
                      return;
                    }
                  }
                }
                Err( e ) => yield Err( KernelError::ResponseMalformed( e.to_string() ) ),
              }
            }
            Err( e ) => yield Err( KernelError::Internal( format!( "sse error : {e}" ) ) ),
          }
        }
      };

      Ok( Box::pin( stream ) )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::provider_registry::types::{ ChatParameters, ChatTurn };

    fn sample_request() -> ChatRequest
    {
      ChatRequest
      {
        model : "gpt-4o-mini".into(),
        system_prompt : None,
        prior_turns : vec![ ChatTurn { role : "assistant".into(), content : "earlier".into() } ],
        user_message : "continue".into(),
        parameters : ChatParameters::default(),
      }
    }

    #[ test ]
    fn wire_request_carries_prior_turns_and_user_message_in_order()
    {
      let request = sample_request();
      let body = wire_request( &request, false );
      assert_eq!( body.messages.len(), 2 );
      assert_eq!( body.messages[ 0 ].role, "assistant" );
      assert_eq!( body.messages[ 1 ].content, "continue" );
    }

    #[ test ]
    fn wire_response_decodes_streaming_delta()
    {
      let raw = r#"{"choices":[{"message":null,"delta":{"content":"hel"},"finish_reason":null}],"usage":null}"#;
      let wire : WireResponse = serde_json::from_str( raw ).unwrap();
      let delta = wire.choices[ 0 ].delta.as_ref().unwrap().content.as_deref();
      assert_eq!( delta, Some( "hel" ) );
      assert!( wire.usage.is_none() );
    }

    #[ test ]
    fn accepts_gpt_and_o_series_models()
    {
      let provider = OpenAiProvider::default();
      assert!( provider.accepts( "gpt-4o-mini" ) );
      assert!( provider.accepts( "o1-preview" ) );
      assert!( provider.accepts( "o3-mini" ) );
      assert!( !provider.accepts( "claude-3-haiku-20240307" ) );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    OpenAiProvider,
  };
}
