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

  const ORIGIN : &str = "https://api.anthropic.com";
  const ANTHROPIC_VERSION : &str = "2023-06-01";

  #[ derive( Debug, Serialize ) ]
  struct WireMessage< 'a >
  {
    role : &'a str,
    content : &'a str,
  }

  /// Anthropic's wire shape differs from the OpenAI family in two ways
  /// (spec §4.3) : `system` is a top-level field, not a message, and there
  /// is no `frequency_penalty` / `presence_penalty` support.
  #[ derive( Debug, Serialize ) ]
  struct WireRequest< 'a >
  {
    model : &'a str,
    messages : Vec< WireMessage< 'a > >,
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    system : Option< &'a str >,
    max_tokens : u32,
    stream : bool,
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    temperature : Option< f32 >,
    #[ serde( skip_serializing_if = "Option::is_none" ) ]
    top_p : Option< f32 >,
    #[ serde( skip_serializing_if = "Vec::is_empty" ) ]
    stop_sequences : Vec< String >,
  }

  const DEFAULT_MAX_TOKENS : u32 = 4_096;

  fn wire_request< 'a >( request : &'a ChatRequest, stream : bool ) -> WireRequest< 'a >
  {
    let mut messages = Vec::with_capacity( request.prior_turns.len() + 1 );
    for turn in &request.prior_turns
    {
      messages.push( WireMessage { role : &turn.role, content : &turn.content } );
    }
    messages.push( WireMessage { role : "user", content : &request.user_message } );

    WireRequest
    {
      model : &request.model,
      messages,
      system : request.system_prompt.as_deref(),
      max_tokens : request.parameters.max_tokens.unwrap_or( DEFAULT_MAX_TOKENS ),
      stream,
      temperature : request.parameters.temperature,
      top_p : request.parameters.top_p,
      stop_sequences : request.parameters.stop_sequences.clone(),
    }
  }

  #[ derive( Debug, Deserialize ) ]
  struct WireUsage
  {
    #[ serde( default ) ]
    input_tokens : u64,
    #[ serde( default ) ]
    output_tokens : u64,
  }

  #[ derive( Debug, Deserialize ) ]
  struct WireContentBlock
  {
    text : Option< String >,
  }

  #[ derive( Debug, Deserialize ) ]
  struct WireResponse
  {
    content : Vec< WireContentBlock >,
    usage : Option< WireUsage >,
    stop_reason : Option< String >,
  }

  #[ derive( Debug, Deserialize ) ]
  #[ serde( tag = "type" ) ]
  enum WireStreamEvent
  {
    #[ serde( rename = "message_start" ) ]
    MessageStart
    {
      message : WireMessageStart,
    },
    #[ serde( rename = "content_block_delta" ) ]
    ContentBlockDelta
    {
      delta : WireDelta,
    },
    #[ serde( rename = "message_delta" ) ]
    MessageDelta
    {
      delta : WireMessageDelta,
      usage : Option< WireUsage >,
    },
    #[ serde( rename = "message_stop" ) ]
    MessageStop,
    #[ serde( other ) ]
    Other,
  }

  #[ derive( Debug, Deserialize ) ]
  struct WireMessageStart
  {
    usage : Option< WireUsage >,
  }

  #[ derive( Debug, Deserialize ) ]
  struct WireDelta
  {
    text : Option< String >,
  }

  #[ derive( Debug, Deserialize ) ]
  struct WireMessageDelta
  {
    stop_reason : Option< String >,
  }

  /// The Anthropic provider : `messages` API with a top-level `system` field
  /// and named SSE events instead of OpenAI's uniform `delta` shape (spec §4.3).
  #[ derive( Debug ) ]
  pub struct AnthropicProvider
  {
    client : reqwest::Client,
    base_url : String,
  }

  impl Default for AnthropicProvider
  {
    fn default() -> Self
    {
      Self { client : reqwest::Client::default(), base_url : ORIGIN.to_string() }
    }
  }

  impl AnthropicProvider
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
  impl Provider for AnthropicProvider
  {
    fn id( &self ) -> &'static str
    {
      "anthropic"
    }

    fn accepts( &self, model : &str ) -> bool
    {
      model.starts_with( "claude-" )
    }

    fn origin( &self ) -> &'static str
    {
      ORIGIN
    }

    fn validate_key( &self, key : &str ) -> bool
    {
      CredentialVault::validate_format( "anthropic", key )
    }

    async fn chat( &self, api_key : &SecretString, request : &ChatRequest ) -> Result< ChatReply >
    {
      let body = wire_request( request, false );
      let response = self.client
        .post( format!( "{}/v1/messages", self.base_url ) )
        .header( "x-api-key", api_key.expose_secret() )
        .header( "anthropic-version", ANTHROPIC_VERSION )
        .json( &body )
        .send()
        .await?;

      if !response.status().is_success()
      {
        return Err( KernelError::from( response.error_for_status().unwrap_err() ) );
      }

      let wire : WireResponse = response.json().await?;
      let content = wire.content.into_iter()
        .find_map( | block | block.text )
        .ok_or_else( || KernelError::ResponseMalformed( "no text content block in anthropic response".into() ) )?;

      let usage = wire.usage
        .map( | u | Usage { prompt_tokens : u.input_tokens, completion_tokens : u.output_tokens } )
        .unwrap_or_else( Usage::conservative_default );

      let cost = crate::provider_registry::cost::compute_cost( usage, &request.model );
      let _ = wire.stop_reason;
      Ok( ChatReply { content, usage, cost } )
    }

    async fn stream( &self, api_key : &SecretString, request : &ChatRequest ) -> Result< ProviderEventStream >
    {
      let body = wire_request( request, true );
      let response = self.client
        .post( format!( "{}/v1/messages", self.base_url ) )
        .header( "x-api-key", api_key.expose_secret() )
        .header( "anthropic-version", ANTHROPIC_VERSION )
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
              match serde_json::from_str::< WireStreamEvent >( &event.data )
              {
                Ok( WireStreamEvent::MessageStart { message } ) =>
                {
                  if let Some( usage ) = message.usage
                  {
                    accumulated_usage.prompt_tokens = usage.input_tokens;
                    accumulated_usage.completion_tokens = usage.output_tokens;
                  }
                  yield Ok( ProviderStreamEvent::Named( "message_start".into() ) );
                }
                Ok( WireStreamEvent::ContentBlockDelta { delta } ) =>
                {
                  if let Some( text ) = delta.text
                  {
                    yield Ok( ProviderStreamEvent::ContentDelta( text ) );
                  }
                }
                Ok( WireStreamEvent::MessageDelta { delta, usage } ) =>
                {
                  if let Some( usage ) = usage
                  {
                    accumulated_usage.completion_tokens = usage.output_tokens;
                    if usage.input_tokens > 0
                    {
                      accumulated_usage.prompt_tokens = usage.input_tokens;
                    }
                  }
                  yield Ok( ProviderStreamEvent::Done
                  {
                    final_content : None,
                    usage : accumulated_usage,
                    finish_reason : delta.stop_reason,
                  } );
                }
                Ok( WireStreamEvent::MessageStop ) =>
                {
                  return;
                }
                Ok( WireStreamEvent::Other ) =>
                {}
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
        model : "claude-3-haiku-20240307".into(),
        system_prompt : Some( "be terse".into() ),
        prior_turns : vec![ ChatTurn { role : "user".into(), content : "hi".into() } ],
        user_message : "now what".into(),
        parameters : ChatParameters::default(),
      }
    }

    #[ test ]
    fn wire_request_carries_system_as_top_level_field_not_a_message()
    {
      let request = sample_request();
      let body = wire_request( &request, false );
      assert_eq!( body.system, Some( "be terse" ) );
      assert_eq!( body.messages.len(), 2 );
      assert_eq!( body.messages[ 0 ].role, "user" );
      assert_eq!( body.messages[ 1 ].content, "now what" );
    }

    #[ test ]
    fn wire_request_omits_system_field_when_none_is_set()
    {
      let mut request = sample_request();
      request.system_prompt = None;
      let body = wire_request( &request, true );
      assert!( body.system.is_none() );
      assert!( body.stream );
    }

    #[ test ]
    fn wire_response_decodes_content_block_and_usage()
    {
      let raw = r#"{"content":[{"text":"hello there"}],"usage":{"input_tokens":5,"output_tokens":3},"stop_reason":"end_turn"}"#;
      let wire : WireResponse = serde_json::from_str( raw ).unwrap();
      assert_eq!( wire.content[ 0 ].text.as_deref(), Some( "hello there" ) );
      assert_eq!( wire.usage.as_ref().unwrap().input_tokens, 5 );
    }

    #[ test ]
    fn stream_events_decode_by_tag()
    {
      let start = r#"{"type":"message_start","message":{"usage":{"input_tokens":5,"output_tokens":0}}}"#;
      let delta = r#"{"type":"content_block_delta","delta":{"text":"hel"}}"#;
      let stop = r#"{"type":"message_stop"}"#;
      let unknown = r#"{"type":"ping"}"#;

      assert!( matches!( serde_json::from_str::< WireStreamEvent >( start ).unwrap(), WireStreamEvent::MessageStart { .. } ) );
      assert!( matches!( serde_json::from_str::< WireStreamEvent >( delta ).unwrap(), WireStreamEvent::ContentBlockDelta { .. } ) );
      assert!( matches!( serde_json::from_str::< WireStreamEvent >( stop ).unwrap(), WireStreamEvent::MessageStop ) );
      assert!( matches!( serde_json::from_str::< WireStreamEvent >( unknown ).unwrap(), WireStreamEvent::Other ) );
    }

    #[ test ]
    fn accepts_only_claude_prefixed_models()
    {
      let provider = AnthropicProvider::default();
      assert!( provider.accepts( "claude-3-haiku-20240307" ) );
      assert!( !provider.accepts( "gpt-4o-mini" ) );
    }
  }
}

crate::mod_interface!
{
  exposed use
  {
    AnthropicProvider,
  };
}
